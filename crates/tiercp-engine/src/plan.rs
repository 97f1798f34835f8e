//! Operation planning
//!
//! A plan is built once, before any byte moves, and is not revised while the
//! transfer runs. Directory plans come from a single walk that collects the
//! file pairs and the total size together.

use crate::session::CancelHandle;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tiercp_types::{Error, ProgressReporter, ProgressSnapshot, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Minimum interval between scan progress updates
pub const SCAN_REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// One file to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// File to read
    pub source: PathBuf,
    /// File to write
    pub destination: PathBuf,
    /// Size at scan time
    pub size: u64,
}

/// Immutable list of transfers for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    /// Source root as given by the caller
    pub source_root: PathBuf,
    /// Destination root after resolution
    pub destination_root: PathBuf,
    /// Files in transfer order
    pub files: Vec<PlannedFile>,
    /// Sum of file sizes at scan time
    pub total_bytes: u64,
    /// Whether the source is a directory
    pub is_directory: bool,
}

impl OperationPlan {
    /// Number of files in the plan
    pub fn file_count(&self) -> u64 {
        self.files.len() as u64
    }
}

/// Plan a single-file operation
///
/// A destination that is an existing directory receives the source file name.
pub async fn plan_file(source: &Path, destination: &Path) -> Result<OperationPlan> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| Error::planning(format!("Cannot stat {}: {}", source.display(), e)))?;

    let destination = match (tokio::fs::metadata(destination).await, source.file_name()) {
        (Ok(existing), Some(name)) if existing.is_dir() => destination.join(name),
        _ => destination.to_path_buf(),
    };

    Ok(OperationPlan {
        source_root: source.to_path_buf(),
        destination_root: destination.clone(),
        files: vec![PlannedFile {
            source: source.to_path_buf(),
            destination,
            size: metadata.len(),
        }],
        total_bytes: metadata.len(),
        is_directory: false,
    })
}

/// Absolute form of `path` with `.`, `..` and symlinks resolved
///
/// The nearest existing ancestor is canonicalized and the missing tail is
/// appended to it, so destinations that do not exist yet still resolve.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut tail = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return tail.iter().rev().fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Reject a destination that is the source itself or lies inside the source tree
pub fn check_overlap(plan: &OperationPlan) -> Result<()> {
    let source = resolve_path(&plan.source_root);
    let destination = resolve_path(&plan.destination_root);
    let overlaps = if plan.is_directory {
        destination.starts_with(&source)
    } else {
        destination == source
    };
    if overlaps {
        return Err(Error::OverlappingPaths {
            source_path: plan.source_root.clone(),
            destination: plan.destination_root.clone(),
        });
    }
    Ok(())
}

fn scan_label(count: usize) -> String {
    format!("Scanning... ({} files)", count)
}

fn report_scan(reporter: &dyn ProgressReporter, count: usize, total_bytes: u64) {
    reporter.report_progress(&ProgressSnapshot {
        current: scan_label(count),
        total_bytes,
        processed_bytes: 0,
        bytes_per_second: 0.0,
        file_index: 0,
        file_count: count as u64,
    });
}

/// Walk `source` and pair every regular file with its place under `destination`
///
/// Blocking; run it off the async executor. Any traversal error fails the plan.
pub fn scan_directory(
    source: &Path,
    destination: &Path,
    reporter: &dyn ProgressReporter,
    cancel: &CancelHandle,
) -> Result<OperationPlan> {
    let mut files = Vec::new();
    let mut total_bytes = 0u64;
    let mut last_report = Instant::now();

    report_scan(reporter, 0, 0);

    for entry in WalkDir::new(source).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let entry = entry.map_err(|e| {
            warn!("Directory scan failed under {}: {}", source.display(), e);
            Error::planning(format!("Cannot scan {}: {}", source.display(), e))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::planning(e.to_string()))?;
        let size = entry
            .metadata()
            .map_err(|e| {
                Error::planning(format!("Cannot stat {}: {}", entry.path().display(), e))
            })?
            .len();

        total_bytes += size;
        files.push(PlannedFile {
            source: entry.path().to_path_buf(),
            destination: destination.join(relative),
            size,
        });

        if last_report.elapsed() >= SCAN_REPORT_INTERVAL {
            report_scan(reporter, files.len(), total_bytes);
            last_report = Instant::now();
        }
    }

    report_scan(reporter, files.len(), total_bytes);
    debug!(
        "Planned {} files ({} bytes) from {}",
        files.len(),
        total_bytes,
        source.display()
    );

    Ok(OperationPlan {
        source_root: source.to_path_buf(),
        destination_root: destination.to_path_buf(),
        files,
        total_bytes,
        is_directory: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tiercp_types::{NullReporter, TransferReport};

    #[derive(Default)]
    struct Labels(Mutex<Vec<String>>);

    impl ProgressReporter for Labels {
        fn report_progress(&self, snapshot: &ProgressSnapshot) {
            self.0.lock().unwrap().push(snapshot.current.clone());
        }
        fn report_error(&self, _error: &Error) {}
        fn report_completion(&self, _report: &TransferReport) {}
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub").join("deep")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("sub").join("b.txt"), b"world!").unwrap();
        std::fs::write(dir.path().join("sub").join("deep").join("c.bin"), vec![7u8; 100]).unwrap();
        dir
    }

    #[test]
    fn test_scan_pairs_and_totals() {
        let src = tree();
        let dst = PathBuf::from("/target");
        let plan = scan_directory(src.path(), &dst, &NullReporter, &CancelHandle::new()).unwrap();

        assert_eq!(plan.file_count(), 3);
        assert_eq!(plan.total_bytes, 111);
        assert!(plan.is_directory);
        let b = plan
            .files
            .iter()
            .find(|f| f.source.ends_with("b.txt"))
            .unwrap();
        assert_eq!(b.destination, dst.join("sub").join("b.txt"));
    }

    #[test]
    fn test_scan_reports_final_count() {
        let src = tree();
        let labels = Labels::default();
        scan_directory(src.path(), Path::new("/t"), &labels, &CancelHandle::new()).unwrap();

        let labels = labels.0.into_inner().unwrap();
        assert_eq!(labels.first().unwrap(), "Scanning... (0 files)");
        assert_eq!(labels.last().unwrap(), "Scanning... (3 files)");
    }

    #[test]
    fn test_scan_observes_cancel() {
        let src = tree();
        let cancel = CancelHandle::new();
        cancel.cancel();
        let result = scan_directory(src.path(), Path::new("/t"), &NullReporter, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_scan_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = scan_directory(
            &dir.path().join("missing"),
            Path::new("/t"),
            &NullReporter,
            &CancelHandle::new(),
        );
        assert!(matches!(result, Err(Error::PlanningFailed { .. })));
    }

    #[test]
    fn test_resolve_path_folds_parent_components() {
        let dir = TempDir::new().unwrap();
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        let tricky = dir.path().join("missing").join("..").join("out").join(".").join("f.bin");
        assert_eq!(resolve_path(&tricky), canonical.join("out").join("f.bin"));
    }

    #[tokio::test]
    async fn test_check_overlap_same_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.bin");
        std::fs::write(&file, b"data").unwrap();
        let alias = dir.path().join(".").join("a.bin");

        let plan = plan_file(&file, &alias).await.unwrap();
        assert!(matches!(
            check_overlap(&plan),
            Err(Error::OverlappingPaths { .. })
        ));

        let plan = plan_file(&file, &dir.path().join("b.bin")).await.unwrap();
        assert!(check_overlap(&plan).is_ok());
    }

    #[tokio::test]
    async fn test_check_overlap_file_into_its_own_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.bin");
        std::fs::write(&file, b"data").unwrap();

        let plan = plan_file(&file, dir.path()).await.unwrap();
        assert!(check_overlap(&plan).is_err());
    }

    #[test]
    fn test_check_overlap_nested_directory() {
        let src = tree();
        let inside = src.path().join("sub").join("backup");
        let plan = scan_directory(src.path(), &inside, &NullReporter, &CancelHandle::new()).unwrap();
        assert!(check_overlap(&plan).is_err());

        let sibling = TempDir::new().unwrap();
        let plan = scan_directory(src.path(), sibling.path(), &NullReporter, &CancelHandle::new())
            .unwrap();
        assert!(check_overlap(&plan).is_ok());
    }

    #[tokio::test]
    async fn test_plan_file_into_existing_directory() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("photo.raw");
        std::fs::write(&file, vec![1u8; 42]).unwrap();

        let plan = plan_file(&file, dst.path()).await.unwrap();
        assert_eq!(plan.files[0].destination, dst.path().join("photo.raw"));
        assert_eq!(plan.total_bytes, 42);
        assert!(!plan.is_directory);
    }
}
