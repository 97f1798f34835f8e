//! File operation engine
//!
//! One operation runs at a time: Idle, then Scanning (directories only), then
//! Transferring, ending Completed, Cancelled or Failed. Copy and move share one
//! routine; move deletes each source file after its copy succeeds.

use crate::plan::{check_overlap, plan_file, resolve_path, scan_directory, OperationPlan, PlannedFile};
use crate::session::{CancelHandle, TransferSession};
use crate::staging::StagingArea;
use crate::stream::{copy_stream, discard, StreamContext};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiercp_device::{OptimalSettings, SpaceProbe, SystemSpace};
use tiercp_types::{
    BufferSize, DriveLetter, Error, FailurePolicy, FileFailure, NullReporter, OperationKind,
    ProgressReporter, Result, ThreadCount, TransferReport,
};
use tracing::{debug, info, warn};

/// Chunk used when writing to the RAM volume and for staging
pub const RAM_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Files above this size use [`LARGE_FILE_CHUNK_SIZE`]
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;
/// Chunk for large files
pub const LARGE_FILE_CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Default chunk size
    pub buffer_size: BufferSize,
    /// Advisory parallelism, reported but not used internally
    pub thread_count: ThreadCount,
    /// Root of the detected RAM volume
    pub ram_root: Option<PathBuf>,
    /// Allow two-phase staging through the RAM volume
    pub use_ram_staging: bool,
    /// Reaction to a failed file in a directory operation
    pub failure_policy: FailurePolicy,
    /// Copy modification times to the destination
    pub preserve_timestamps: bool,
}

impl EngineConfig {
    /// Adopt the buffer size and thread count chosen by the optimizer
    pub fn apply_settings(&mut self, settings: &OptimalSettings) {
        self.buffer_size = settings.buffer_size();
        self.thread_count = settings.threads();
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            thread_count: ThreadCount::default(),
            ram_root: None,
            use_ram_staging: true,
            failure_policy: FailurePolicy::AbortOnFirst,
            preserve_timestamps: true,
        }
    }
}

/// How bytes travel for one operation
#[derive(Debug)]
enum Strategy {
    Direct { destination_on_ram: bool },
    Staged(StagingArea),
}

/// Chunk size for one file
pub fn chunk_size_for(destination_on_ram: bool, file_size: u64, default: BufferSize) -> usize {
    if destination_on_ram {
        RAM_CHUNK_SIZE
    } else if file_size > LARGE_FILE_THRESHOLD {
        LARGE_FILE_CHUNK_SIZE
    } else {
        default.get()
    }
}

/// Whether `path` lives on the volume rooted at `root`
///
/// Drive letters decide when both sides carry one; otherwise both paths are
/// resolved and compared by prefix.
pub fn is_on_volume(path: &Path, root: &Path) -> bool {
    if let (Some(a), Some(b)) = (DriveLetter::from_path(path), DriveLetter::from_path(root)) {
        return a == b;
    }
    resolve_path(path).starts_with(resolve_path(root))
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Buffered copy/move engine
pub struct FileOperationEngine {
    config: EngineConfig,
    space: Arc<dyn SpaceProbe>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelHandle,
    session: TransferSession,
    last_report: Option<TransferReport>,
}

impl FileOperationEngine {
    /// Engine with system free-space queries and no callbacks
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            space: Arc::new(SystemSpace),
            reporter: Arc::new(NullReporter),
            cancel: CancelHandle::new(),
            session: TransferSession::new(),
            last_report: None,
        }
    }

    /// Replace the free-space source
    pub fn with_space_probe(mut self, space: Arc<dyn SpaceProbe>) -> Self {
        self.space = space;
        self
    }

    /// Replace the progress reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable configuration, for use between operations
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Handle that cancels the running operation from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation of the running operation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Progress counters of the current or last operation
    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Report of the last finished operation, including skipped files
    pub fn last_report(&self) -> Option<&TransferReport> {
        self.last_report.as_ref()
    }

    /// Copy a file or directory tree
    pub async fn copy<S: AsRef<Path>, D: AsRef<Path>>(
        &mut self,
        source: S,
        destination: D,
    ) -> Result<TransferReport> {
        self.run(OperationKind::Copy, source.as_ref(), destination.as_ref())
            .await
    }

    /// Move a file or directory tree
    pub async fn move_path<S: AsRef<Path>, D: AsRef<Path>>(
        &mut self,
        source: S,
        destination: D,
    ) -> Result<TransferReport> {
        self.run(OperationKind::Move, source.as_ref(), destination.as_ref())
            .await
    }

    async fn run(
        &mut self,
        kind: OperationKind,
        source: &Path,
        destination: &Path,
    ) -> Result<TransferReport> {
        self.session = TransferSession::new();
        self.last_report = None;
        let result = self.execute(kind, source, destination).await;
        self.cancel.reset();
        result
    }

    async fn execute(
        &mut self,
        kind: OperationKind,
        source: &Path,
        destination: &Path,
    ) -> Result<TransferReport> {
        info!(
            "Starting {}: {} -> {} (buffer {} bytes, {} threads advisory)",
            kind,
            source.display(),
            destination.display(),
            self.config.buffer_size.get(),
            self.config.thread_count.get()
        );

        let plan = match self.prepare(kind, source, destination).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("{} aborted before transfer: {}", kind, e);
                self.reporter.report_error(&e);
                return Err(e);
            }
        };

        let strategy = self.choose_strategy(kind, &plan);
        let outcome = self.transfer(kind, &plan, &strategy).await;

        if let Strategy::Staged(area) = &strategy {
            area.remove().await;
        }

        let report = outcome?;

        if kind == OperationKind::Move && plan.is_directory {
            prune_empty_dirs(&plan.source_root).await;
        }

        info!(
            "{} finished: {} files, {} bytes in {:?}",
            kind, report.files_transferred, report.bytes_transferred, report.duration
        );
        self.reporter.report_completion(&report);
        self.last_report = Some(report.clone());

        if report.failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::PartialFailure {
                failed: report.failures.len() as u64,
                total: plan.file_count(),
            })
        }
    }

    async fn prepare(
        &mut self,
        kind: OperationKind,
        source: &Path,
        destination: &Path,
    ) -> Result<OperationPlan> {
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|_| Error::SourceNotFound {
                path: source.to_path_buf(),
            })?;

        let plan = if metadata.is_dir() {
            let reporter = Arc::clone(&self.reporter);
            let cancel = self.cancel.clone();
            let src = source.to_path_buf();
            let dst = destination.to_path_buf();
            tokio::task::spawn_blocking(move || {
                scan_directory(&src, &dst, reporter.as_ref(), &cancel)
            })
            .await
            .map_err(|e| Error::planning(format!("Scan task failed: {}", e)))??
        } else {
            plan_file(source, destination).await?
        };
        check_overlap(&plan)?;

        self.session.total_bytes = plan.total_bytes;
        self.session.file_count = plan.file_count();

        if kind == OperationKind::Copy {
            match self.space.space_for(&plan.destination_root) {
                Ok(space) if space.free < plan.total_bytes => {
                    return Err(Error::InsufficientSpace {
                        path: plan.destination_root.clone(),
                        required: plan.total_bytes,
                        available: space.free,
                    });
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping destination space check: {}", e),
            }
        }

        Ok(plan)
    }

    fn choose_strategy(&mut self, kind: OperationKind, plan: &OperationPlan) -> Strategy {
        let Some(ram_root) = self.config.ram_root.clone() else {
            return Strategy::Direct {
                destination_on_ram: false,
            };
        };

        if is_on_volume(&plan.destination_root, &ram_root) {
            info!("Destination is the RAM volume, streaming directly");
            return Strategy::Direct {
                destination_on_ram: true,
            };
        }

        let direct = Strategy::Direct {
            destination_on_ram: false,
        };
        if kind != OperationKind::Copy || !self.config.use_ram_staging || plan.files.is_empty() {
            return direct;
        }

        match self.space.space_for(&ram_root) {
            Ok(space) if space.free >= plan.total_bytes => {
                info!(
                    "Staging through RAM volume {} ({} bytes free)",
                    ram_root.display(),
                    space.free
                );
                self.session.total_bytes = plan.total_bytes * 2;
                Strategy::Staged(StagingArea::new(&ram_root))
            }
            Ok(space) => {
                info!(
                    "RAM volume has {} bytes free, {} required: transferring directly",
                    space.free, plan.total_bytes
                );
                direct
            }
            Err(e) => {
                debug!("RAM volume space unavailable, transferring directly: {}", e);
                direct
            }
        }
    }

    async fn transfer(
        &mut self,
        kind: OperationKind,
        plan: &OperationPlan,
        strategy: &Strategy,
    ) -> Result<TransferReport> {
        let mut report = TransferReport {
            kind,
            files_transferred: 0,
            bytes_transferred: 0,
            staged: matches!(strategy, Strategy::Staged(_)),
            duration: std::time::Duration::ZERO,
            failures: Vec::new(),
        };

        if plan.is_directory {
            create_dir(&plan.destination_root)
                .await
                .map_err(|e| self.fail(e))?;
        }
        if let Strategy::Staged(area) = strategy {
            area.create().await.map_err(|e| self.fail(e))?;
        }

        for (index, file) in plan.files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.fail(Error::Cancelled));
            }

            self.session.file_index = index as u64 + 1;
            self.session.current = display_name(&file.source);
            self.reporter.report_progress(&self.session.snapshot());

            match self.transfer_file(kind, index + 1, file, strategy).await {
                Ok(bytes) => {
                    report.files_transferred += 1;
                    report.bytes_transferred += bytes;
                }
                Err(Error::Cancelled) => return Err(self.fail(Error::Cancelled)),
                Err(e) => {
                    let e = self.fail(e);
                    match self.config.failure_policy {
                        FailurePolicy::AbortOnFirst => return Err(e),
                        FailurePolicy::SkipAndReport => report.failures.push(FileFailure {
                            source: file.source.clone(),
                            message: e.to_string(),
                        }),
                    }
                }
            }
        }

        report.duration = self.session.elapsed();
        Ok(report)
    }

    async fn transfer_file(
        &mut self,
        kind: OperationKind,
        index: usize,
        file: &PlannedFile,
        strategy: &Strategy,
    ) -> Result<u64> {
        if let Some(parent) = file.destination.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir(parent).await?;
            }
        }

        let source_mtime = if self.config.preserve_timestamps {
            tokio::fs::metadata(&file.source)
                .await
                .ok()
                .map(|m| FileTime::from_last_modification_time(&m))
        } else {
            None
        };

        let buffer_size = self.config.buffer_size;
        let mut ctx = StreamContext {
            session: &mut self.session,
            reporter: self.reporter.as_ref(),
            cancel: &self.cancel,
        };

        let bytes = match strategy {
            Strategy::Direct { destination_on_ram } => {
                let chunk = chunk_size_for(*destination_on_ram, file.size, buffer_size);
                copy_stream(&file.source, &file.destination, chunk, &mut ctx).await?
            }
            Strategy::Staged(area) => {
                let staged = area.staged_path(index, &file.source);
                copy_stream(&file.source, &staged, RAM_CHUNK_SIZE, &mut ctx).await?;
                let chunk = chunk_size_for(false, file.size, buffer_size);
                let result = copy_stream(&staged, &file.destination, chunk, &mut ctx).await;
                discard(&staged).await;
                result?
            }
        };

        if let Some(mtime) = source_mtime {
            if let Err(e) = filetime::set_file_mtime(&file.destination, mtime) {
                warn!(
                    "Could not preserve timestamp on {}: {}",
                    file.destination.display(),
                    e
                );
            }
        }

        if kind == OperationKind::Move {
            tokio::fs::remove_file(&file.source)
                .await
                .map_err(|e| Error::Io {
                    message: format!(
                        "Copied {} but could not remove it: {}",
                        file.source.display(),
                        e
                    ),
                })?;
        }

        debug!(
            "{} {} -> {} ({} bytes)",
            kind,
            file.source.display(),
            file.destination.display(),
            bytes
        );
        Ok(bytes)
    }

    fn fail(&self, error: Error) -> Error {
        warn!("{}", error);
        self.reporter.report_error(&error);
        error
    }
}

impl std::fmt::Debug for FileOperationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOperationEngine")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::DirectoryCreateFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Remove `root` and its subdirectories bottom-up where they are empty
async fn prune_empty_dirs(root: &Path) {
    let root = root.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || {
        for entry in walkdir::WalkDir::new(&root)
            .contents_first(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_dir())
        {
            if std::fs::remove_dir(entry.path()).is_err() {
                debug!("Left non-empty directory {}", entry.path().display());
            }
        }
    })
    .await;
    if let Err(e) = outcome {
        debug!("Source cleanup task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, 500 * 1024 * 1024, RAM_CHUNK_SIZE)]
    #[case(false, 200 * 1024 * 1024, LARGE_FILE_CHUNK_SIZE)]
    #[case(false, 100 * 1024 * 1024, BufferSize::DEFAULT)]
    #[case(false, 10, BufferSize::DEFAULT)]
    fn test_chunk_policy(#[case] on_ram: bool, #[case] size: u64, #[case] expected: usize) {
        assert_eq!(chunk_size_for(on_ram, size, BufferSize::default()), expected);
    }

    #[rstest]
    #[case(r"R:\stage\a.bin", r"R:\", true)]
    #[case(r"r:\stage", r"R:\", true)]
    #[case(r"D:\out", r"R:\", false)]
    #[case("/mnt/ram/out", "/mnt/ram", true)]
    #[case("/mnt/ramdisk/out", "/mnt/ram", false)]
    #[case("/mnt/ram/x/../y", "/mnt/ram", true)]
    #[case("/mnt/ram/../disk/y", "/mnt/ram", false)]
    fn test_is_on_volume(#[case] path: &str, #[case] root: &str, #[case] expected: bool) {
        assert_eq!(is_on_volume(Path::new(path), Path::new(root)), expected);
    }

    #[test]
    fn test_is_on_volume_relative_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let cwd = std::env::current_dir().unwrap();
        let root = relative_to(&cwd, dir.path());
        assert!(is_on_volume(&dir.path().join("out.bin"), &root));
    }

    fn relative_to(base: &Path, target: &Path) -> PathBuf {
        let base = resolve_path(base);
        let target = resolve_path(target);
        let common = base
            .components()
            .zip(target.components())
            .take_while(|(a, b)| a == b)
            .count();
        let mut relative = PathBuf::new();
        for _ in base.components().skip(common) {
            relative.push("..");
        }
        for part in target.components().skip(common) {
            relative.push(part);
        }
        relative
    }

    #[test]
    fn test_apply_settings() {
        let mut config = EngineConfig::default();
        config.apply_settings(&tiercp_device::select(
            tiercp_types::StorageClass::Ssd,
            tiercp_types::StorageClass::Ram,
        ));
        assert_eq!(config.buffer_size.get(), 8 * 1024 * 1024);
        assert_eq!(config.thread_count.get(), 16);
    }
}
