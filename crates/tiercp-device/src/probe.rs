//! Operating-system volume queries
//!
//! Every OS fact the classifier, the RAM volume detector and the cache rely on is
//! read through [`VolumeProbe`]. Each query is fallible in isolation: `None` means
//! the query failed, which the callers treat differently from a negative answer.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tiercp_types::{DeviceDescriptor, DriveLetter, OsDriveType};

/// Capacity of a volume in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskSpace {
    /// Capacity
    pub total: u64,
    /// Free bytes available to the caller
    pub free: u64,
}

impl DiskSpace {
    /// Fraction of the capacity in use, `0.0..=1.0`
    pub fn used_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total.saturating_sub(self.free) as f64 / self.total as f64
        }
    }
}

/// One row of the management-instrumentation logical disk listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDisk {
    /// Letter from the `Name` column, if it parsed
    pub letter: Option<DriveLetter>,
    /// Free-form description, e.g. `Local Fixed Disk`
    pub description: String,
}

/// Source of per-letter volume facts
#[async_trait]
pub trait VolumeProbe: Send + Sync {
    /// Letters with a mounted volume
    async fn present_letters(&self) -> Vec<DriveLetter>;

    /// Kernel device path behind the letter
    async fn device_path(&self, letter: DriveLetter) -> Option<String>;

    /// Volume label; an unlabeled volume yields `Some("")`
    async fn volume_label(&self, letter: DriveLetter) -> Option<String>;

    /// OS drive-type flag
    async fn drive_type(&self, letter: DriveLetter) -> Option<OsDriveType>;

    /// Volume serial number
    async fn volume_serial(&self, letter: DriveLetter) -> Option<u32>;

    /// Capacity and free space
    async fn disk_space(&self, letter: DriveLetter) -> Option<DiskSpace>;

    /// Whether a process with the given image name is running
    async fn process_running(&self, image_name: &str) -> Option<bool>;

    /// Raw status report of an installed driver service
    async fn service_status(&self, service: &str) -> Option<String>;

    /// Logical disks as reported by management instrumentation
    async fn logical_disks(&self) -> Option<Vec<LogicalDisk>>;

    /// Friendly names of enumerated storage devices
    async fn storage_device_names(&self) -> Option<Vec<String>>;

    /// Whether the letter currently has a mounted volume
    async fn exists(&self, letter: DriveLetter) -> bool {
        self.present_letters().await.contains(&letter)
    }

    /// Filesystem path at which the letter's volume is reachable
    fn mount_root(&self, letter: DriveLetter) -> PathBuf {
        letter.root()
    }

    /// Gather the classification inputs for one letter
    async fn describe(&self, letter: DriveLetter) -> DeviceDescriptor {
        DeviceDescriptor {
            letter,
            device_path: self.device_path(letter).await,
            volume_label: self.volume_label(letter).await,
            drive_type: self.drive_type(letter).await,
        }
    }
}

/// Shared probe handle
pub type SharedProbe = Arc<dyn VolumeProbe>;

/// Probe for platforms without drive letters; every query reports nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVolumes;

#[async_trait]
impl VolumeProbe for NoVolumes {
    async fn present_letters(&self) -> Vec<DriveLetter> {
        Vec::new()
    }

    async fn device_path(&self, _letter: DriveLetter) -> Option<String> {
        None
    }

    async fn volume_label(&self, _letter: DriveLetter) -> Option<String> {
        None
    }

    async fn drive_type(&self, _letter: DriveLetter) -> Option<OsDriveType> {
        None
    }

    async fn volume_serial(&self, _letter: DriveLetter) -> Option<u32> {
        None
    }

    async fn disk_space(&self, _letter: DriveLetter) -> Option<DiskSpace> {
        None
    }

    async fn process_running(&self, _image_name: &str) -> Option<bool> {
        None
    }

    async fn service_status(&self, _service: &str) -> Option<String> {
        None
    }

    async fn logical_disks(&self) -> Option<Vec<LogicalDisk>> {
        None
    }

    async fn storage_device_names(&self) -> Option<Vec<String>> {
        None
    }
}

/// The probe for the current platform
#[cfg(windows)]
pub fn system_probe() -> SharedProbe {
    Arc::new(crate::windows::WindowsProbe::new())
}

/// The probe for the current platform
#[cfg(not(windows))]
pub fn system_probe() -> SharedProbe {
    Arc::new(NoVolumes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_ratio() {
        let space = DiskSpace {
            total: 1000,
            free: 950,
        };
        assert!((space.used_ratio() - 0.05).abs() < f64::EPSILON);
        assert_eq!(DiskSpace::default().used_ratio(), 0.0);
    }

    #[tokio::test]
    async fn test_no_volumes_describe() {
        let letter = DriveLetter::new('C').unwrap();
        let descriptor = NoVolumes.describe(letter).await;
        assert_eq!(descriptor, DeviceDescriptor::empty(letter));
        assert!(!NoVolumes.exists(letter).await);
    }
}
