//! Core traits for TierCP operations

use crate::{Error, ProgressSnapshot, TransferReport};

/// Trait for reporting progress during operations
///
/// Calls are made synchronously on the task running the operation.
pub trait ProgressReporter: Send + Sync {
    /// Report progress information
    fn report_progress(&self, snapshot: &ProgressSnapshot);

    /// Report an error that occurred during the operation
    fn report_error(&self, error: &Error);

    /// Report completion of the operation
    fn report_completion(&self, report: &TransferReport);
}

/// Reporter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report_progress(&self, _snapshot: &ProgressSnapshot) {}

    fn report_error(&self, _error: &Error) {}

    fn report_completion(&self, _report: &TransferReport) {}
}
