//! Persisted accurate-tier classifications
//!
//! The on-disk record is a small JSON document:
//!
//! ```json
//! { "classification": { "C": "nvme" }, "serials": { "C": 305419896 } }
//! ```
//!
//! Read and write failures are logged and swallowed; a missing or corrupt file
//! behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tiercp_types::{DriveLetter, StorageClass};
use tracing::{debug, trace};

/// Serialized form of the accurate tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Class per letter, as lower-case strings
    #[serde(default)]
    pub classification: BTreeMap<String, String>,
    /// Volume serial per letter at the time of classification
    #[serde(default)]
    pub serials: BTreeMap<String, u32>,
}

impl CacheRecord {
    /// Well-formed `(letter, class, serial)` triples; malformed keys or classes are skipped
    pub fn entries(&self) -> Vec<(DriveLetter, StorageClass, Option<u32>)> {
        self.classification
            .iter()
            .filter_map(|(key, value)| {
                let letter = key.parse::<DriveLetter>().ok()?;
                let class = value.parse::<StorageClass>().ok()?;
                Some((letter, class, self.serials.get(key).copied()))
            })
            .collect()
    }

    /// Record one entry
    pub fn insert(&mut self, letter: DriveLetter, class: StorageClass, serial: Option<u32>) {
        let key = letter.to_string();
        self.classification.insert(key.clone(), class.to_string());
        match serial {
            Some(serial) => {
                self.serials.insert(key, serial);
            }
            None => {
                self.serials.remove(&key);
            }
        }
    }
}

/// JSON file holding a [`CacheRecord`]
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    /// Use the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, returning an empty one on any failure
    pub async fn load(&self) -> CacheRecord {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No classification cache at {}: {}", self.path.display(), e);
                return CacheRecord::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!("Ignoring corrupt classification cache {}: {}", self.path.display(), e);
            CacheRecord::default()
        })
    }

    /// Write the record, logging failures
    pub async fn save(&self, record: &CacheRecord) {
        if let Err(e) = self.try_save(record).await {
            debug!("Failed to save classification cache {}: {}", self.path.display(), e);
        }
    }

    async fn try_save(&self, record: &CacheRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(record).map_err(std::io::Error::other)?;
        tokio::fs::write(&self.path, content).await?;
        trace!("Saved {} classifications", record.classification.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_entries_skip_malformed() {
        let record: CacheRecord = serde_json::from_str(
            r#"{
                "classification": { "C": "nvme", "D": "floppy", "too-long": "ssd", "e": "usb" },
                "serials": { "C": 42 }
            }"#,
        )
        .unwrap();
        let entries = record.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&(DriveLetter::new('C').unwrap(), StorageClass::Nvme, Some(42))));
        assert!(entries.contains(&(DriveLetter::new('E').unwrap(), StorageClass::Usb, None)));
    }

    #[test]
    fn test_record_missing_sections() {
        let record: CacheRecord = serde_json::from_str("{}").unwrap();
        assert!(record.entries().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let file = CacheFile::new(dir.path().join("nested").join("cache.json"));

        let mut record = CacheRecord::default();
        record.insert(DriveLetter::new('D').unwrap(), StorageClass::Ssd, Some(7));
        file.save(&record).await;

        assert_eq!(file.load().await, record);
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt() {
        let dir = TempDir::new().unwrap();
        let file = CacheFile::new(dir.path().join("cache.json"));
        assert_eq!(file.load().await, CacheRecord::default());

        std::fs::write(file.path(), "{ not json").unwrap();
        assert_eq!(file.load().await, CacheRecord::default());
    }
}
