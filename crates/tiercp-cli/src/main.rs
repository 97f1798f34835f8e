//! TierCP - storage-aware copy and move tool
//!
//! Classifies the storage behind the source and destination, picks buffer size
//! and parallelism for the pair, and stages copies through a RAM volume when
//! one is mounted and has room.

mod display;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use display::{
    display_cache_stats, display_classification, display_drives, display_error, display_info,
    display_ram_volume, display_report, display_settings, display_success, display_warning,
    DriveRow,
};
use progress::CliProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiercp_config::{load_overrides, Config, ConfigLoader, StorageOverrides};
use tiercp_device::{
    system_probe, CacheFile, ClassificationCache, ClassificationCacheConfig, ParameterOptimizer,
    PowerShellRefiner, RamDriveDetector, SharedClassificationCache, SharedProbe,
};
use tiercp_engine::{EngineConfig, FileOperationEngine};
use tiercp_types::{DriveLetter, Error, FailurePolicy, OperationKind, ProgressReporter};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// TierCP - storage-aware copy and move tool
#[derive(Parser)]
#[command(
    name = "tiercp",
    version = env!("CARGO_PKG_VERSION"),
    about = "Storage-aware copy and move tool",
    long_about = "TierCP classifies the storage behind each path (ram, nvme, ssd, usb, nas, hdd),\n\
                  tunes buffer size and parallelism for the pair, and stages copies through a\n\
                  RAM volume when one is available."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON where supported
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a file or directory
    Copy {
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Move a file or directory
    Move {
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Classify the storage behind a path
    Classify {
        /// Path to classify
        path: PathBuf,
    },
    /// List present drives and their classes
    Drives,
    /// Show the detected RAM volume
    Ramdrive {
        /// Discard the remembered result and detect again
        #[arg(long)]
        refresh: bool,
    },
    /// Show the transfer settings chosen for a source/destination pair
    Settings {
        /// Source path
        source: PathBuf,
        /// Destination path
        destination: PathBuf,
    },
    /// Reclassify one or more drives
    Refresh {
        /// Drive letters, e.g. `D` or `D:`
        #[arg(required = true, num_args = 1..)]
        letters: Vec<DriveLetter>,
        /// Repeat the bus-type query even if it was already tried
        #[arg(long)]
        force: bool,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Write the shown configuration to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct TransferArgs {
    /// Source path
    source: PathBuf,
    /// Destination path
    destination: PathBuf,
    /// Never stage through the RAM volume
    #[arg(long)]
    no_staging: bool,
    /// Keep going after a failed file and report all failures at the end
    #[arg(long)]
    skip_errors: bool,
    /// Buffer size in MB, overriding the optimizer
    #[arg(long)]
    buffer_mb: Option<usize>,
}

/// Detection services shared by every command
struct Services {
    probe: SharedProbe,
    cache: SharedClassificationCache,
    detector: RamDriveDetector,
    optimizer: ParameterOptimizer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfigLoader::load_default().unwrap_or_else(|e| {
            display_warning(&format!("Ignoring invalid configuration: {}", e));
            Config::default()
        }),
    };

    let _guard = init_logging(&cli, &config)?;

    info!("TierCP v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Copy { transfer } => {
            transfer_command(OperationKind::Copy, transfer, &config, cli.quiet).await?;
        }
        Commands::Move { transfer } => {
            transfer_command(OperationKind::Move, transfer, &config, cli.quiet).await?;
        }
        Commands::Classify { path } => classify_command(&path, &config, cli.json).await?,
        Commands::Drives => drives_command(&config, cli.json).await?,
        Commands::Ramdrive { refresh } => ramdrive_command(refresh, &config, cli.json).await?,
        Commands::Settings {
            source,
            destination,
        } => settings_command(&source, &destination, &config, cli.json).await?,
        Commands::Refresh { letters, force } => refresh_command(&letters, force, &config).await?,
        Commands::Config { default, write } => config_command(default, write, &config)?,
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let (file_layer, guard) = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tiercp.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.logging.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(guard)
}

fn overrides_from(config: &Config) -> StorageOverrides {
    let Some(path) = config.detection.overrides_path() else {
        return StorageOverrides::new();
    };
    load_overrides(&path).unwrap_or_else(|e| {
        warn!("Ignoring storage overrides: {}", e);
        StorageOverrides::new()
    })
}

async fn build_services(config: &Config) -> Services {
    let probe = system_probe();
    let detection = &config.detection;

    let mut builder = ClassificationCache::builder(Arc::clone(&probe))
        .overrides(overrides_from(config))
        .config(ClassificationCacheConfig {
            refine_timeout: detection.refine_timeout(),
            max_concurrent_refinements: detection.max_concurrent_refinements,
        });
    if detection.refine {
        builder = builder.refiner(Arc::new(PowerShellRefiner::with_program(
            detection.powershell.clone(),
            detection.refine_timeout(),
        )));
    }
    if detection.persist_cache {
        if let Some(path) = detection.cache_path() {
            debug!("Using classification cache {}", path.display());
            builder = builder.store(CacheFile::new(path));
        }
    }

    let cache: SharedClassificationCache = Arc::new(builder.load().await);
    Services {
        probe: Arc::clone(&probe),
        optimizer: ParameterOptimizer::new(Arc::clone(&cache)),
        detector: RamDriveDetector::new(probe),
        cache,
    }
}

async fn transfer_command(
    kind: OperationKind,
    args: TransferArgs,
    config: &Config,
    quiet: bool,
) -> Result<()> {
    let services = build_services(config).await;
    let settings = services
        .optimizer
        .get_optimal(&args.source, &args.destination)
        .await;
    let ram = services.detector.info().await;

    let mut engine_config = EngineConfig {
        buffer_size: config.engine.buffer_size,
        ram_root: ram.root.clone(),
        use_ram_staging: config.engine.use_ram_staging && !args.no_staging,
        failure_policy: if args.skip_errors {
            FailurePolicy::SkipAndReport
        } else {
            config.engine.failure_policy
        },
        preserve_timestamps: config.engine.preserve_timestamps,
        ..EngineConfig::default()
    };
    if config.engine.auto_tune {
        engine_config.apply_settings(&settings);
    } else {
        engine_config.thread_count = settings.threads();
    }
    if let Some(mb) = args.buffer_mb {
        engine_config.buffer_size = tiercp_types::BufferSize::from_mb(mb)
            .map_err(anyhow::Error::msg)
            .context("Invalid --buffer-mb")?;
    }

    if !quiet {
        println!(
            "{} {} {} to {}",
            style("→").green().bold(),
            if kind == OperationKind::Copy {
                "Copying"
            } else {
                "Moving"
            },
            style(args.source.display()).cyan(),
            style(args.destination.display()).cyan()
        );
        println!(
            "  {} → {}, {}",
            style(settings.source_class).yellow(),
            style(settings.dest_class).yellow(),
            style(&settings.description).dim()
        );
        if let Some(letter) = ram.letter {
            println!("  RAM volume: {}:", style(letter).yellow());
        }
    }

    let reporter = Arc::new(CliProgress::new(quiet));
    let shared: Arc<dyn ProgressReporter> = Arc::clone(&reporter) as Arc<dyn ProgressReporter>;
    let mut engine = FileOperationEngine::new(engine_config).with_reporter(shared);

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = match kind {
        OperationKind::Copy => engine.copy(&args.source, &args.destination).await,
        OperationKind::Move => engine.move_path(&args.source, &args.destination).await,
    };
    reporter.clear();

    match result {
        Ok(report) => {
            if !quiet {
                display_report(&report);
            }
            display_success(&format!("{} completed", kind));
            Ok(())
        }
        Err(e @ Error::PartialFailure { .. }) => {
            if let Some(report) = engine.last_report() {
                display_report(report);
            }
            Err(e.into())
        }
        Err(Error::Cancelled) => {
            display_warning("Operation cancelled");
            Err(Error::Cancelled.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn classify_command(path: &Path, config: &Config, json: bool) -> Result<()> {
    let services = build_services(config).await;
    let class = services.cache.get_type(path).await;

    if json {
        println!(
            "{}",
            serde_json::json!({ "path": path, "class": class })
        );
    } else {
        display_classification(&path.display().to_string(), class);
    }
    Ok(())
}

async fn drives_command(config: &Config, json: bool) -> Result<()> {
    let services = build_services(config).await;
    let ram_letter = services.detector.letter().await;
    let overrides: Vec<DriveLetter> = services
        .cache
        .accurate_entries()
        .await
        .into_iter()
        .filter(|entry| entry.is_override)
        .map(|entry| entry.letter)
        .collect();

    let mut rows = Vec::new();
    for (letter, quick_class) in services.cache.fast_entries().await {
        if letter.is_floppy() {
            continue;
        }
        rows.push(DriveRow {
            letter,
            class: services.cache.get_type(letter.root()).await,
            quick_class,
            label: services
                .probe
                .volume_label(letter)
                .await
                .filter(|label| !label.is_empty()),
            is_override: overrides.contains(&letter),
            is_ram_volume: ram_letter == Some(letter),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        display_drives(&rows);
        display_cache_stats(&services.cache.stats());
    }
    Ok(())
}

async fn ramdrive_command(refresh: bool, config: &Config, json: bool) -> Result<()> {
    let services = build_services(config).await;
    if refresh {
        services.detector.refresh().await;
    }
    let info = services.detector.info().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        display_ram_volume(&info);
    }
    Ok(())
}

async fn settings_command(
    source: &Path,
    destination: &Path,
    config: &Config,
    json: bool,
) -> Result<()> {
    let services = build_services(config).await;
    let settings = services.optimizer.get_optimal(source, destination).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        display_settings(&settings);
    }
    Ok(())
}

async fn refresh_command(letters: &[DriveLetter], force: bool, config: &Config) -> Result<()> {
    let services = build_services(config).await;
    for (letter, class) in services.cache.refresh_letters(letters, force).await {
        display_classification(&format!("{}:", letter), class);
    }
    Ok(())
}

fn config_command(default: bool, write: Option<PathBuf>, config: &Config) -> Result<()> {
    let shown = if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        Config::default()
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        match ConfigLoader::config_exists() {
            Some(path) => display_info(&format!("Loaded from {}", path.display())),
            None => display_info("No configuration file found, using defaults"),
        }
        config.clone()
    };

    if let Some(path) = write {
        ConfigLoader::save_to_file(&shown, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        display_success(&format!("Configuration written to {}", path.display()));
        return Ok(());
    }

    match ConfigLoader::render(&shown, Path::new("tiercp.yaml")) {
        Ok(text) => println!("{}", text),
        Err(e) => display_error(&e.to_string()),
    }
    Ok(())
}
