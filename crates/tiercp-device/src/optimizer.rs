//! Transfer parameter selection from storage classes
//!
//! Each [`StorageClass`] has a fixed [`StorageProfile`]. For a source/destination
//! pair the profile with the higher priority governs the transfer; on a tie the
//! source wins.

use crate::cache::SharedClassificationCache;
use serde::Serialize;
use std::path::Path;
use tiercp_types::{BufferSize, StorageClass, ThreadCount};
use tracing::debug;

/// Tuning row for one storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageProfile {
    /// Class this row describes
    pub class: StorageClass,
    /// Display name
    pub name: &'static str,
    /// Speed label
    pub speed: &'static str,
    /// Transfer buffer in megabytes
    pub buffer_size_mb: usize,
    /// Advisory parallelism
    pub thread_count: usize,
    /// Higher priority governs a transfer
    pub priority: u8,
}

/// Tuning row for a class
pub const fn profile(class: StorageClass) -> StorageProfile {
    match class {
        StorageClass::Ram => StorageProfile {
            class,
            name: "RamDrive",
            speed: "Extreme (RAM)",
            buffer_size_mb: 8,
            thread_count: 16,
            priority: 10,
        },
        StorageClass::Nvme => StorageProfile {
            class,
            name: "NVMe",
            speed: "Ultra-fast",
            buffer_size_mb: 256,
            thread_count: 12,
            priority: 5,
        },
        StorageClass::Ssd => StorageProfile {
            class,
            name: "SSD",
            speed: "Fast",
            buffer_size_mb: 128,
            thread_count: 8,
            priority: 4,
        },
        StorageClass::Usb => StorageProfile {
            class,
            name: "USB/External",
            speed: "Moderate",
            buffer_size_mb: 64,
            thread_count: 4,
            priority: 2,
        },
        StorageClass::Nas => StorageProfile {
            class,
            name: "NAS/Network",
            speed: "Slow",
            buffer_size_mb: 32,
            thread_count: 2,
            priority: 1,
        },
        StorageClass::Hdd => StorageProfile {
            class,
            name: "HDD",
            speed: "Slow",
            buffer_size_mb: 80,
            thread_count: 2,
            priority: 1,
        },
    }
}

/// Settings chosen for one source/destination pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimalSettings {
    /// Buffer size in megabytes
    pub buffer_size_mb: usize,
    /// Advisory parallelism
    pub thread_count: usize,
    /// Source classification
    pub source_class: StorageClass,
    /// Destination classification
    pub dest_class: StorageClass,
    /// Source display name
    pub source_name: &'static str,
    /// Destination display name
    pub dest_name: &'static str,
    /// Speed label of the governing profile
    pub speed_class: &'static str,
    /// Human-readable summary
    pub description: String,
}

impl OptimalSettings {
    /// Buffer size as a validated value
    pub fn buffer_size(&self) -> BufferSize {
        BufferSize::from_mb(self.buffer_size_mb).unwrap_or_default()
    }

    /// Thread count as a validated value
    pub fn threads(&self) -> ThreadCount {
        ThreadCount::new(self.thread_count).unwrap_or_default()
    }
}

/// Pick settings for a pair of classes
pub fn select(source: StorageClass, dest: StorageClass) -> OptimalSettings {
    let src = profile(source);
    let dst = profile(dest);
    let governing = if src.priority >= dst.priority { src } else { dst };

    OptimalSettings {
        buffer_size_mb: governing.buffer_size_mb,
        thread_count: governing.thread_count,
        source_class: source,
        dest_class: dest,
        source_name: src.name,
        dest_name: dst.name,
        speed_class: governing.speed,
        description: format!("optimized for {} ({})", governing.name, governing.speed),
    }
}

/// Resolves paths to classes through the cache, then applies [`select`]
#[derive(Debug, Clone)]
pub struct ParameterOptimizer {
    cache: SharedClassificationCache,
}

impl ParameterOptimizer {
    /// Create an optimizer over a shared cache
    pub fn new(cache: SharedClassificationCache) -> Self {
        Self { cache }
    }

    /// Settings for copying from `source` to `dest`
    pub async fn get_optimal<S: AsRef<Path>, D: AsRef<Path>>(
        &self,
        source: S,
        dest: D,
    ) -> OptimalSettings {
        let source_class = self.cache.get_type(source.as_ref()).await;
        let dest_class = self.cache.get_type(dest.as_ref()).await;
        let settings = select(source_class, dest_class);
        debug!(
            "Optimal settings {} -> {}: {}MB buffer, {} threads",
            source_class, dest_class, settings.buffer_size_mb, settings.thread_count
        );
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ClassificationCache;
    use crate::probe::NoVolumes;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tiercp_types::DriveLetter;

    #[rstest]
    #[case(StorageClass::Ram, 8, 16, 10)]
    #[case(StorageClass::Nvme, 256, 12, 5)]
    #[case(StorageClass::Ssd, 128, 8, 4)]
    #[case(StorageClass::Usb, 64, 4, 2)]
    #[case(StorageClass::Nas, 32, 2, 1)]
    #[case(StorageClass::Hdd, 80, 2, 1)]
    fn test_profile_table(
        #[case] class: StorageClass,
        #[case] buffer_mb: usize,
        #[case] threads: usize,
        #[case] priority: u8,
    ) {
        let row = profile(class);
        assert_eq!(row.buffer_size_mb, buffer_mb);
        assert_eq!(row.thread_count, threads);
        assert_eq!(row.priority, priority);
    }

    #[test]
    fn test_same_class_uses_its_row() {
        for class in StorageClass::ALL {
            let settings = select(class, class);
            assert_eq!(settings.buffer_size_mb, profile(class).buffer_size_mb);
            assert_eq!(settings.thread_count, profile(class).thread_count);
        }
    }

    #[test]
    fn test_higher_priority_governs() {
        let settings = select(StorageClass::Usb, StorageClass::Nvme);
        assert_eq!(settings.buffer_size_mb, 256);
        assert_eq!(settings.thread_count, 12);
        assert_eq!(settings.description, "optimized for NVMe (Ultra-fast)");
    }

    #[test]
    fn test_tie_favors_source() {
        let settings = select(StorageClass::Nas, StorageClass::Hdd);
        assert_eq!(settings.buffer_size_mb, 32);
        assert_eq!(settings.thread_count, 2);

        let settings = select(StorageClass::Hdd, StorageClass::Nas);
        assert_eq!(settings.buffer_size_mb, 80);
    }

    #[test]
    fn test_validated_values() {
        let settings = select(StorageClass::Ram, StorageClass::Ssd);
        assert_eq!(settings.buffer_size().get(), 8 * 1024 * 1024);
        assert_eq!(settings.threads().get(), 16);
    }

    #[tokio::test]
    async fn test_get_optimal_through_cache() {
        let mut overrides = HashMap::new();
        overrides.insert(DriveLetter::new('R').unwrap(), StorageClass::Ram);
        overrides.insert(DriveLetter::new('U').unwrap(), StorageClass::Usb);
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .overrides(overrides)
            .load()
            .await;
        let optimizer = ParameterOptimizer::new(Arc::new(cache));

        let settings = optimizer.get_optimal(r"U:\photos", r"R:\stage").await;
        assert_eq!(settings.source_class, StorageClass::Usb);
        assert_eq!(settings.dest_class, StorageClass::Ram);
        assert_eq!(settings.buffer_size_mb, 8);
        assert_eq!(settings.thread_count, 16);
    }
}
