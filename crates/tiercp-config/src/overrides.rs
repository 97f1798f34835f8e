//! Storage override record
//!
//! A JSON document of the form
//!
//! ```json
//! {"storage_type_override": {"R": "ram", "comment": "pinned by hand"}}
//! ```
//!
//! Keys that are not drive letters and values that are not storage classes
//! are skipped with a warning. The record is read-only from TierCP's side.

use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tiercp_types::{DriveLetter, StorageClass};
use tracing::{debug, warn};

/// Letter to class pins applied on top of detection
pub type StorageOverrides = HashMap<DriveLetter, StorageClass>;

const OVERRIDE_SECTION: &str = "storage_type_override";

#[derive(Debug, Default, Deserialize)]
struct OverrideRecord {
    #[serde(default, rename = "storage_type_override")]
    entries: BTreeMap<String, serde_json::Value>,
}

/// Parse the record text
pub fn parse_overrides(text: &str) -> Result<StorageOverrides, serde_json::Error> {
    let record: OverrideRecord = serde_json::from_str(text)?;
    let mut overrides = StorageOverrides::new();

    for (key, value) in record.entries {
        if key.eq_ignore_ascii_case("comment") {
            continue;
        }
        let Ok(letter) = key.parse::<DriveLetter>() else {
            warn!("Ignoring {} key '{}': not a drive letter", OVERRIDE_SECTION, key);
            continue;
        };
        match value.as_str().map(str::parse::<StorageClass>) {
            Some(Ok(class)) => {
                overrides.insert(letter, class);
            }
            _ => warn!("Ignoring override for {}: unknown storage class {}", letter, value),
        }
    }

    Ok(overrides)
}

/// Load the record at `path`; a missing file yields no overrides
pub fn load_overrides<P: AsRef<Path>>(path: P) -> ConfigResult<StorageOverrides> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No storage override record at {}", path.display());
            return Ok(StorageOverrides::new());
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let overrides =
        parse_overrides(&text).map_err(|e| ConfigError::overrides(path, e.to_string()))?;
    debug!("Loaded {} storage overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}
