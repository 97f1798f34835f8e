//! Per-operation progress state and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiercp_types::ProgressSnapshot;

/// Cloneable cancel flag shared between the engine and its caller
///
/// A request made before an operation starts cancels that operation. The
/// engine clears the flag when an operation ends.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create an unset handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the running operation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Mutable progress counters for one operation
#[derive(Debug, Clone)]
pub struct TransferSession {
    /// Current file name or phase label
    pub current: String,
    /// Bytes the operation will process
    pub total_bytes: u64,
    /// Bytes processed so far
    pub processed_bytes: u64,
    /// 1-based index of the current file
    pub file_index: u64,
    /// Files in the operation
    pub file_count: u64,
    started: Instant,
}

impl TransferSession {
    /// Fresh session starting now
    pub fn new() -> Self {
        Self {
            current: String::new(),
            total_bytes: 0,
            processed_bytes: 0,
            file_index: 0,
            file_count: 0,
            started: Instant::now(),
        }
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average throughput since the session started
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.processed_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Count bytes moved by one chunk
    pub fn advance(&mut self, bytes: u64) {
        self.processed_bytes += bytes;
    }

    /// Immutable view for callbacks
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current: self.current.clone(),
            total_bytes: self.total_bytes,
            processed_bytes: self.processed_bytes,
            bytes_per_second: self.bytes_per_second(),
            file_index: self.file_index,
            file_count: self.file_count,
        }
    }
}

impl Default for TransferSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());

        clone.cancel();
        assert!(handle.is_cancelled());

        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let mut session = TransferSession::new();
        session.total_bytes = 200;
        session.file_count = 2;
        session.file_index = 1;
        session.current = "a.bin".to_string();
        session.advance(50);
        session.advance(50);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.processed_bytes, 100);
        assert_eq!(snapshot.percentage(), 50.0);
        assert_eq!(snapshot.current, "a.bin");
    }
}
