//! File operation engine for TierCP
//!
//! This crate moves bytes. Given a source and destination it builds an
//! [`OperationPlan`], checks free space, decides between direct streaming and
//! two-phase staging through the RAM volume, and streams each file in chunks
//! sized for its destination. It includes:
//!
//! - **Planning**: A single directory walk producing file pairs and the total size
//! - **Streaming**: Chunked copy with progress after every chunk
//! - **Staging**: Source to RAM volume to destination, cleaned up afterwards
//! - **Cancellation**: A cloneable [`CancelHandle`] checked per chunk and per file
//! - **Callbacks**: Closure hooks through [`EngineCallbacks`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiercp_engine::{EngineCallbacks, EngineConfig, FileOperationEngine};
//!
//! # async fn example() -> tiercp_types::Result<()> {
//! let callbacks = EngineCallbacks::new()
//!     .on_progress(|p| println!("{:.1}% {}", p.percentage(), p.current));
//! let mut engine = FileOperationEngine::new(EngineConfig::default())
//!     .with_reporter(Arc::new(callbacks));
//! let report = engine.copy("photos", "backup/photos").await?;
//! println!("Copied {} files", report.files_transferred);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod callbacks;
pub mod engine;
pub mod plan;
pub mod session;
pub mod staging;
pub mod stream;

pub use callbacks::EngineCallbacks;
pub use engine::{
    chunk_size_for, is_on_volume, EngineConfig, FileOperationEngine, LARGE_FILE_CHUNK_SIZE,
    LARGE_FILE_THRESHOLD, RAM_CHUNK_SIZE,
};
pub use plan::{check_overlap, resolve_path, OperationPlan, PlannedFile};
pub use session::{CancelHandle, TransferSession};
pub use staging::{StagingArea, STAGING_PREFIX};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tiercp_types::{Error, FailurePolicy, OperationKind};

    fn write(path: &std::path::Path, len: usize) -> Vec<u8> {
        let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, &data).unwrap();
        data
    }

    #[tokio::test]
    async fn test_copy_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.bin");
        let dst = dir.path().join("out").join("copy.bin");
        let data = write(&src, 300_000);

        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);
        let callbacks = EngineCallbacks::new().on_progress(move |p| {
            *seen.lock().unwrap() = Some(p.clone());
        });
        let mut engine =
            FileOperationEngine::new(EngineConfig::default()).with_reporter(Arc::new(callbacks));

        let report = tokio_test::assert_ok!(engine.copy(&src, &dst).await);
        assert_eq!(report.kind, OperationKind::Copy);
        assert_eq!(report.bytes_transferred, data.len() as u64);
        assert!(!report.staged);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        assert!(src.exists());

        let last = last.lock().unwrap().clone().unwrap();
        assert_eq!(last.percentage(), 100.0);
        assert_eq!(last.file_count, 1);
    }

    #[tokio::test]
    async fn test_move_directory_removes_source_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), 10);
        write(&src.join("nested").join("b.txt"), 20);
        std::fs::create_dir_all(src.join("empty")).unwrap();
        let dst = dir.path().join("dst");

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        let report = engine.move_path(&src, &dst).await.unwrap();

        assert_eq!(report.files_transferred, 2);
        assert!(!src.exists());
        assert_eq!(std::fs::read(dst.join("nested").join("b.txt")).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_missing_source_reported_once() {
        let dir = TempDir::new().unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        let callbacks =
            EngineCallbacks::new().on_error(move |m| seen.lock().unwrap().push(m.to_string()));
        let mut engine =
            FileOperationEngine::new(EngineConfig::default()).with_reporter(Arc::new(callbacks));

        let result = engine
            .copy(dir.path().join("ghost"), dir.path().join("out"))
            .await;
        assert!(matches!(result, Err(Error::SourceNotFound { .. })));
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_cancel_before_transfer_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.bin");
        write(&src, 50_000);
        let dst = dir.path().join("out.bin");

        let engine_cancel = Arc::new(Mutex::new(None::<CancelHandle>));
        let handle_slot = Arc::clone(&engine_cancel);
        let callbacks = EngineCallbacks::new().on_progress(move |_| {
            if let Some(handle) = handle_slot.lock().unwrap().as_ref() {
                handle.cancel();
            }
        });
        let mut engine = FileOperationEngine::new(EngineConfig {
            buffer_size: tiercp_types::BufferSize::new(4096).unwrap(),
            ..EngineConfig::default()
        })
        .with_reporter(Arc::new(callbacks));
        *engine_cancel.lock().unwrap() = Some(engine.cancel_handle());

        let result = engine.copy(&src, &dst).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!dst.exists());
        assert!(!engine.cancel_handle().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_requested_before_run_is_kept() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.bin");
        write(&src, 1000);
        let dst = dir.path().join("out.bin");

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        engine.cancel_handle().cancel();

        let result = engine.copy(&src, &dst).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!dst.exists());

        let report = tokio_test::assert_ok!(engine.copy(&src, &dst).await);
        assert_eq!(report.bytes_transferred, 1000);
    }

    #[tokio::test]
    async fn test_copy_onto_itself_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.bin");
        let data = write(&src, 5000);

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        let result = engine.copy(&src, &src).await;

        assert!(matches!(result, Err(Error::OverlappingPaths { .. })));
        assert_eq!(std::fs::read(&src).unwrap(), data);
    }

    #[tokio::test]
    async fn test_move_onto_itself_keeps_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.bin");
        let data = write(&src, 5000);

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        let result = engine.move_path(&src, dir.path()).await;

        assert!(matches!(result, Err(Error::OverlappingPaths { .. })));
        assert_eq!(std::fs::read(&src).unwrap(), data);
    }

    #[tokio::test]
    async fn test_copy_directory_into_itself_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), 10);

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        let result = engine.copy(&src, src.join("backup")).await;

        assert!(matches!(result, Err(Error::OverlappingPaths { .. })));
        assert!(!src.join("backup").exists());
    }

    #[tokio::test]
    async fn test_move_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.bin");
        let dst = dir.path().join("moved").join("b.bin");
        let data = write(&src, 5000);

        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);
        let callbacks = EngineCallbacks::new().on_progress(move |p| {
            *seen.lock().unwrap() = Some(p.clone());
        });
        let mut engine =
            FileOperationEngine::new(EngineConfig::default()).with_reporter(Arc::new(callbacks));

        let report = engine.move_path(&src, &dst).await.unwrap();
        assert_eq!(report.kind, OperationKind::Move);
        assert_eq!(report.files_transferred, 1);
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), data);

        let last = last.lock().unwrap().clone().unwrap();
        assert_eq!(last.percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_copy_directory_direct() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let a = write(&src.join("a.txt"), 10);
        let b = write(&src.join("nested").join("b.bin"), 70_000);
        let dst = dir.path().join("dst");

        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);
        let callbacks = EngineCallbacks::new().on_progress(move |p| {
            *seen.lock().unwrap() = Some(p.clone());
        });
        let mut engine =
            FileOperationEngine::new(EngineConfig::default()).with_reporter(Arc::new(callbacks));

        let report = engine.copy(&src, &dst).await.unwrap();
        assert!(!report.staged);
        assert_eq!(report.files_transferred, 2);
        assert_eq!(report.bytes_transferred, 70_010);
        assert_eq!(std::fs::read(dst.join("a.txt")).unwrap(), a);
        assert_eq!(std::fs::read(dst.join("nested").join("b.bin")).unwrap(), b);
        assert!(src.join("a.txt").exists());

        let last = last.lock().unwrap().clone().unwrap();
        assert_eq!(last.percentage(), 100.0);
        assert_eq!(last.file_index, 2);
        assert_eq!(last.file_count, 2);
    }

    #[tokio::test]
    async fn test_skip_and_report_collects_failures() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), 10);
        write(&src.join("b.txt"), 10);
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(dst.join("a.txt")).unwrap();

        let mut engine = FileOperationEngine::new(EngineConfig {
            failure_policy: FailurePolicy::SkipAndReport,
            ..EngineConfig::default()
        });
        let result = engine.copy(&src, &dst).await;

        assert!(matches!(
            result,
            Err(Error::PartialFailure { failed: 1, total: 2 })
        ));
        let report = engine.last_report().unwrap();
        assert_eq!(report.files_transferred, 1);
        assert!(report.failures[0].source.ends_with("a.txt"));
        assert!(dst.join("b.txt").is_file());
    }

    #[tokio::test]
    async fn test_abort_on_first_stops_plan() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), 10);
        write(&src.join("b.txt"), 10);
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(dst.join("a.txt")).unwrap();

        let mut engine = FileOperationEngine::new(EngineConfig::default());
        let result = engine.copy(&src, &dst).await;

        assert!(matches!(result, Err(Error::DestinationOpenFailed { .. })));
        assert!(!dst.join("b.txt").exists());
    }
}
