//! Storage classification and transfer tuning for TierCP
//!
//! This crate answers two questions for the copy engine: what kind of storage
//! sits behind a path, and which volume (if any) is backed by RAM. It includes:
//!
//! - **Drive classification**: An ordered rule cascade over OS volume facts
//!   producing one of `ram`, `nvme`, `ssd`, `usb`, `nas` or `hdd`
//! - **RAM volume detection**: Six independent strategies tried in priority order
//! - **Two-tier cache**: Fast wholesale scan plus a persisted accurate tier with
//!   serial-based invalidation, user overrides and bounded bus-type refinement
//! - **Parameter optimizer**: Buffer size and parallelism per source/destination pair
//!
//! All OS access goes through [`VolumeProbe`], so every component can be driven
//! by a scripted probe in tests.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use tiercp_device::{ClassificationCache, NoVolumes, ParameterOptimizer};
//!
//! # tokio_test::block_on(async {
//! let cache = Arc::new(ClassificationCache::builder(Arc::new(NoVolumes)).load().await);
//! let optimizer = ParameterOptimizer::new(cache);
//! let settings = optimizer.get_optimal("/data/in", "/data/out").await;
//! assert_eq!(settings.buffer_size_mb, 80);
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod classifier;
pub mod command;
pub mod keywords;
pub mod optimizer;
pub mod probe;
pub mod ramdrive;
pub mod refine;
pub mod rules;
pub mod space;
pub mod store;

#[cfg(windows)]
pub mod windows;

// Re-export main types
pub use cache::{
    ClassificationCache, ClassificationCacheBuilder, ClassificationCacheConfig,
    ClassificationCacheStats, SharedClassificationCache,
};
pub use classifier::DriveClassifier;
pub use optimizer::{profile, select, OptimalSettings, ParameterOptimizer, StorageProfile};
pub use probe::{system_probe, DiskSpace, LogicalDisk, NoVolumes, SharedProbe, VolumeProbe};
pub use ramdrive::{RamDriveDetector, RamDriveStrategy, RamHit};
pub use refine::{BusTypeRefiner, NoRefiner, PowerShellRefiner};
pub use rules::ClassificationRule;
pub use space::{SpaceProbe, SystemSpace};
pub use store::{CacheFile, CacheRecord};
