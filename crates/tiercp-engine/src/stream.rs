//! Chunked file streaming

use crate::session::{CancelHandle, TransferSession};
use std::path::Path;
use tiercp_types::{Error, ProgressReporter, Result};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

/// Borrowed progress state threaded through a stream
pub struct StreamContext<'a> {
    /// Counters to advance
    pub session: &'a mut TransferSession,
    /// Receives a snapshot after every chunk
    pub reporter: &'a dyn ProgressReporter,
    /// Checked before every chunk
    pub cancel: &'a CancelHandle,
}

/// Remove a partially written file, ignoring failures
pub async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Copy `source` to `destination` in `chunk`-sized pieces
///
/// On cancellation or any I/O failure the destination is removed before the
/// error is returned.
pub async fn copy_stream(
    source: &Path,
    destination: &Path,
    chunk: usize,
    ctx: &mut StreamContext<'_>,
) -> Result<u64> {
    let mut reader = File::open(source)
        .await
        .map_err(|e| Error::SourceOpenFailed {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
    let mut writer = File::create(destination)
        .await
        .map_err(|e| Error::DestinationOpenFailed {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })?;

    let result = pump(&mut reader, &mut writer, source, destination, chunk, ctx).await;
    drop(writer);

    if result.is_err() {
        discard(destination).await;
    }
    result
}

async fn pump(
    reader: &mut File,
    writer: &mut File,
    source: &Path,
    destination: &Path,
    chunk: usize,
    ctx: &mut StreamContext<'_>,
) -> Result<u64> {
    let transfer_error = |e: std::io::Error| Error::Transfer {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        message: e.to_string(),
    };

    let mut buffer = vec![0u8; chunk.max(1)];
    let mut copied = 0u64;

    loop {
        if ctx.cancel.is_cancelled() {
            debug!("Cancelled while writing {}", destination.display());
            return Err(Error::Cancelled);
        }

        let read = reader.read(&mut buffer).await.map_err(transfer_error)?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(transfer_error)?;

        copied += read as u64;
        ctx.session.advance(read as u64);
        ctx.reporter.report_progress(&ctx.session.snapshot());
    }

    writer.flush().await.map_err(transfer_error)?;
    trace!(
        "Streamed {} bytes {} -> {}",
        copied,
        source.display(),
        destination.display()
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiercp_types::NullReporter;

    #[tokio::test]
    async fn test_stream_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &data).unwrap();

        let mut session = TransferSession::new();
        session.total_bytes = data.len() as u64;
        let cancel = CancelHandle::new();
        let mut ctx = StreamContext {
            session: &mut session,
            reporter: &NullReporter,
            cancel: &cancel,
        };

        let copied = copy_stream(&src, &dst, 4096, &mut ctx).await.unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        assert_eq!(session.processed_bytes, data.len() as u64);
    }

    #[tokio::test]
    async fn test_cancel_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        std::fs::write(&src, vec![1u8; 8192]).unwrap();

        let mut session = TransferSession::new();
        let cancel = CancelHandle::new();
        cancel.cancel();
        let mut ctx = StreamContext {
            session: &mut session,
            reporter: &NullReporter,
            cancel: &cancel,
        };

        let result = copy_stream(&src, &dst, 1024, &mut ctx).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_open_failure() {
        let dir = TempDir::new().unwrap();
        let mut session = TransferSession::new();
        let cancel = CancelHandle::new();
        let mut ctx = StreamContext {
            session: &mut session,
            reporter: &NullReporter,
            cancel: &cancel,
        };

        let result = copy_stream(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            1024,
            &mut ctx,
        )
        .await;
        assert!(matches!(result, Err(Error::SourceOpenFailed { .. })));
        assert!(!dir.path().join("out").exists());
    }
}
