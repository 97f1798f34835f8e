//! Free-space queries for arbitrary paths
//!
//! The engine checks destination capacity before copying and RAM volume
//! capacity before staging. The path does not need to exist yet: the query
//! walks up to the nearest existing ancestor.

use crate::probe::DiskSpace;
use std::path::{Path, PathBuf};
use tiercp_types::{Error, Result};

/// Source of free-space information
pub trait SpaceProbe: Send + Sync {
    /// Capacity and free space of the volume holding `path`
    fn space_for(&self, path: &Path) -> Result<DiskSpace>;
}

/// Free-space queries against the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpace;

impl SpaceProbe for SystemSpace {
    fn space_for(&self, path: &Path) -> Result<DiskSpace> {
        let existing = nearest_existing(path).ok_or_else(|| {
            Error::device_detection(format!("No existing ancestor for {}", path.display()))
        })?;
        query(&existing)
    }
}

/// Nearest ancestor of `path` (including itself) that exists
pub fn nearest_existing(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
}

#[cfg(unix)]
fn query(path: &Path) -> Result<DiskSpace> {
    let stats = nix::sys::statvfs::statvfs(path).map_err(|e| {
        Error::device_detection(format!("statvfs failed for {}: {}", path.display(), e))
    })?;
    let block_size = stats.fragment_size() as u64;
    Ok(DiskSpace {
        total: stats.blocks() as u64 * block_size,
        free: stats.blocks_available() as u64 * block_size,
    })
}

#[cfg(windows)]
fn query(path: &Path) -> Result<DiskSpace> {
    crate::windows::disk_free_space(path)
        .ok_or_else(|| Error::device_detection(format!("GetDiskFreeSpaceExW failed for {}", path.display())))
}

#[cfg(not(any(unix, windows)))]
fn query(path: &Path) -> Result<DiskSpace> {
    Err(Error::device_detection(format!(
        "Free-space query unsupported for {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nearest_existing_walks_up() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("a").join("b").join("c.txt");
        assert_eq!(nearest_existing(&missing).as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_system_space_reports_capacity() {
        let dir = TempDir::new().unwrap();
        let space = SystemSpace.space_for(&dir.path().join("not-yet-created")).unwrap();
        assert!(space.total > 0);
        assert!(space.free <= space.total);
    }
}
