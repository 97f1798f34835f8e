//! Closure-based progress hooks

use std::fmt;
use tiercp_types::{Error, ProgressReporter, ProgressSnapshot, TransferReport};

type ProgressHook = Box<dyn Fn(&ProgressSnapshot) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&TransferReport) + Send + Sync>;

/// Optional `on_progress` / `on_error` / `on_complete` hooks
///
/// Hooks run synchronously on the task executing the operation. Marshalling
/// them to another thread or event loop is up to the caller.
#[derive(Default)]
pub struct EngineCallbacks {
    on_progress: Option<ProgressHook>,
    on_error: Option<ErrorHook>,
    on_complete: Option<CompleteHook>,
}

impl EngineCallbacks {
    /// No hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every chunk and at every file boundary
    pub fn on_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(hook));
        self
    }

    /// Called with a description of each failure
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Called once when an operation finishes
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransferReport) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }
}

impl ProgressReporter for EngineCallbacks {
    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        if let Some(hook) = &self.on_progress {
            hook(snapshot);
        }
    }

    fn report_error(&self, error: &Error) {
        if let Some(hook) = &self.on_error {
            hook(&error.to_string());
        }
    }

    fn report_completion(&self, report: &TransferReport) {
        if let Some(hook) = &self.on_complete {
            hook(report);
        }
    }
}

impl fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_hooks_receive_events() {
        let progress = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let progress_seen = Arc::clone(&progress);
        let errors_seen = Arc::clone(&errors);
        let callbacks = EngineCallbacks::new()
            .on_progress(move |_| {
                progress_seen.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |message| errors_seen.lock().unwrap().push(message.to_string()));

        callbacks.report_progress(&ProgressSnapshot {
            current: "a".into(),
            total_bytes: 1,
            processed_bytes: 1,
            bytes_per_second: 0.0,
            file_index: 1,
            file_count: 1,
        });
        callbacks.report_error(&Error::Cancelled);

        assert_eq!(progress.load(Ordering::SeqCst), 1);
        assert_eq!(errors.lock().unwrap().as_slice(), ["Operation cancelled"]);
    }

    #[test]
    fn test_missing_hooks_are_ignored() {
        let callbacks = EngineCallbacks::new();
        callbacks.report_error(&Error::Cancelled);
        assert!(format!("{:?}", callbacks).contains("on_error: false"));
    }
}
