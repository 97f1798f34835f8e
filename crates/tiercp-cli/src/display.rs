//! Terminal output for the TierCP CLI

use console::style;
use std::time::Duration;
use tiercp_device::{profile, ClassificationCacheStats, OptimalSettings};
use tiercp_types::{DriveLetter, RamVolumeInfo, StorageClass, TransferReport};

/// One row of the `drives` listing
#[derive(Debug, Clone, serde::Serialize)]
pub struct DriveRow {
    /// Drive letter
    pub letter: DriveLetter,
    /// Effective classification
    pub class: StorageClass,
    /// Class from the quick device-path and label scan
    pub quick_class: StorageClass,
    /// Volume label, if readable
    pub label: Option<String>,
    /// Whether the class is pinned by the override record
    pub is_override: bool,
    /// Whether this is the detected RAM volume
    pub is_ram_volume: bool,
}

/// Icon for a storage class
pub fn class_icon(class: StorageClass) -> &'static str {
    match class {
        StorageClass::Ram => "⚡",
        StorageClass::Nvme => "🚀",
        StorageClass::Ssd => "💾",
        StorageClass::Usb => "🔌",
        StorageClass::Nas => "🌐",
        StorageClass::Hdd => "💿",
    }
}

/// Print a classification with its tuning row
pub fn display_classification(target: &str, class: StorageClass) {
    let row = profile(class);
    println!(
        "{} {} → {}",
        class_icon(class),
        style(target).cyan(),
        style(class).green().bold()
    );
    println!("  Profile: {} ({})", style(row.name).cyan(), row.speed);
    println!(
        "  Buffer: {} MB, threads: {}, priority: {}",
        style(row.buffer_size_mb).yellow(),
        style(row.thread_count).yellow(),
        row.priority
    );
}

/// Print the optimizer's choice for a transfer
pub fn display_settings(settings: &OptimalSettings) {
    println!();
    println!("{}", style("Transfer Settings:").bold().underlined());
    println!(
        "  Source: {} {} ({})",
        class_icon(settings.source_class),
        style(settings.source_name).cyan(),
        settings.source_class
    );
    println!(
        "  Destination: {} {} ({})",
        class_icon(settings.dest_class),
        style(settings.dest_name).cyan(),
        settings.dest_class
    );
    println!(
        "  Buffer size: {}",
        style(format!("{} MB", settings.buffer_size_mb)).yellow()
    );
    println!("  Threads: {}", style(settings.thread_count).yellow());
    println!("  {}", style(&settings.description).dim());
}

/// Print the drive listing
pub fn display_drives(rows: &[DriveRow]) {
    if rows.is_empty() {
        display_info("No drives found");
        return;
    }

    println!("{}", style("Drives:").bold().underlined());
    for row in rows {
        let refined = format!("refined from {}", row.quick_class);
        let mut flags = Vec::new();
        if row.is_override {
            flags.push("override");
        }
        if row.is_ram_volume {
            flags.push("ram volume");
        }
        if row.class != row.quick_class && !row.is_override {
            flags.push(refined.as_str());
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  {} {}:  {:<5} {}{}",
            class_icon(row.class),
            style(row.letter).bold(),
            style(row.class).green(),
            style(row.label.as_deref().unwrap_or("")).dim(),
            style(flags).yellow()
        );
    }
}

/// Print classification cache counters
pub fn display_cache_stats(stats: &ClassificationCacheStats) {
    println!(
        "  {} {} lookups, {:.0}% from refined entries, {} of {} bus-type queries answered",
        style("Cache:").dim(),
        stats.lookups,
        stats.hit_rate() * 100.0,
        stats.refinements_succeeded,
        stats.refinements_attempted
    );
}

/// Print the detected RAM volume
pub fn display_ram_volume(info: &RamVolumeInfo) {
    let Some(letter) = info.letter else {
        if info.detection_tags.is_empty() {
            display_info("No RAM volume detected");
        } else {
            display_info(&format!(
                "RAM disk software found without a mounted volume ({})",
                info.detection_tags.join(", ")
            ));
        }
        return;
    };

    println!(
        "{} RAM volume {}:",
        class_icon(StorageClass::Ram),
        style(letter).bold()
    );
    println!(
        "  Space: {} free of {}",
        style(format_bytes(info.free_bytes)).green(),
        style(format_bytes(info.total_bytes)).cyan()
    );
    println!("  Detected by: {}", style(info.detection_tags.join(", ")).dim());
}

/// Print the summary of a finished operation
pub fn display_report(report: &TransferReport) {
    println!();
    println!("{}", style("Transfer Statistics:").bold().underlined());
    println!("  Operation: {}", style(report.kind).cyan());
    println!(
        "  Files transferred: {}",
        style(report.files_transferred).green()
    );
    println!(
        "  Bytes transferred: {}",
        style(format_bytes(report.bytes_transferred)).green()
    );
    println!(
        "  Staged through RAM: {}",
        if report.staged {
            style("yes").green()
        } else {
            style("no").dim()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );
    println!(
        "  Transfer rate: {}",
        style(format!("{:.2} MB/s", report.transfer_rate() / 1024.0 / 1024.0)).blue()
    );

    if !report.failures.is_empty() {
        println!("  Failed: {}", style(report.failures.len()).red());
        for failure in &report.failures {
            println!(
                "    • {} ({})",
                style(failure.source.display()).red(),
                style(&failure.message).dim()
            );
        }
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
