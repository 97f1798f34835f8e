//! Progress bar driven by engine callbacks

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tiercp_types::{Error, ProgressReporter, ProgressSnapshot, TransferReport};

/// Engine reporter rendering an indicatif bar
pub struct CliProgress {
    bar: Option<ProgressBar>,
}

impl CliProgress {
    /// Create a reporter; `quiet` suppresses the bar but not errors
    pub fn new(quiet: bool) -> Self {
        let bar = (!quiet).then(|| {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        Self { bar }
    }

    /// Clear the bar without a message
    pub fn clear(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        let Some(pb) = &self.bar else {
            return;
        };

        pb.set_length(snapshot.total_bytes);
        pb.set_position(snapshot.processed_bytes);
        if snapshot.file_index == 0 {
            pb.set_message(snapshot.current.clone());
        } else {
            pb.set_message(format!(
                "[{}/{}] {} - {:.1} MB/s",
                snapshot.file_index,
                snapshot.file_count,
                snapshot.current,
                snapshot.bytes_per_second / 1024.0 / 1024.0
            ));
        }
    }

    fn report_error(&self, error: &Error) {
        let print = || eprintln!("{} {}", style("✗").red().bold(), style(error).red());
        match &self.bar {
            Some(pb) => pb.suspend(print),
            None => print(),
        }
    }

    fn report_completion(&self, _report: &TransferReport) {
        self.clear();
    }
}
