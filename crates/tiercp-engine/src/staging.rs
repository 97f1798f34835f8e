//! Per-operation staging directory on the RAM volume

use std::path::{Path, PathBuf};
use tiercp_types::{Error, Result};
use tracing::{debug, info};

/// Prefix of every staging directory name
pub const STAGING_PREFIX: &str = ".tiercp_transfer_";

/// Temporary directory holding staged copies for one operation
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Pick a fresh directory name under `ram_root`
    pub fn new(ram_root: &Path) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            dir: ram_root.join(format!("{}{}_{}", STAGING_PREFIX, stamp, &id[..8])),
        }
    }

    /// Directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory
    pub async fn create(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::DirectoryCreateFailed {
                path: self.dir.clone(),
                message: e.to_string(),
            })
    }

    /// Staged location for the `index`-th file of the plan
    pub fn staged_path(&self, index: usize, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map_or_else(|| "file".into(), |n| n.to_string_lossy().into_owned());
        self.dir.join(format!("{:06}_{}", index, name))
    }

    /// Remove the directory and anything left in it
    pub async fn remove(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => info!("Removed staging directory {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(
                "Could not remove staging directory {}: {}",
                self.dir.display(),
                e
            ),
        }
    }
}
