//! Keyword families used by the classification rules and RAM volume strategies
//!
//! All matching is case-insensitive substring matching.

use once_cell::sync::Lazy;
use regex::Regex;

/// Volume labels that identify a memory-backed volume
pub const LABEL_RAM: &[&str] = &["ram", "imdisk", "ramdisk", "ram-disk", "memory"];
/// Volume labels that identify NVMe storage
pub const LABEL_NVME: &[&str] = &["nvme", "nvm express"];
/// Volume labels that identify removable storage or its vendors
pub const LABEL_USB: &[&str] = &["usb", "sandisk", "kingston", "removable"];

/// Device paths of memory and virtual-disk drivers
pub const DEVICE_RAM: &[&str] = &["ram", "imdisk", "softperfect", "osfmount", "awealloc", "virtual"];
/// Device paths of NVMe storage
pub const DEVICE_NVME: &[&str] = &["nvme", "nvm express"];
/// Device paths of solid-state storage
pub const DEVICE_SSD: &[&str] = &["ssd", "solid state"];
/// Device paths of removable storage
pub const DEVICE_USB: &[&str] = &["usbstor", "usb", "removable"];
/// Device paths of network redirectors
pub const DEVICE_NAS: &[&str] = &["network", "webdav", "mup", "lanman"];
/// Device paths naming rotational drive vendors
pub const DEVICE_HDD: &[&str] = &["seagate", "western digital", "wd", "hitachi", "toshiba"];

/// Secondary label checks for fixed drives
pub const FIXED_LABEL_USB: &[&str] = &["usb", "removable", "sandisk", "kingston", "transcend", "crucial"];
/// Secondary label checks for fixed drives
pub const FIXED_LABEL_NVME: &[&str] = &["nvme", "nvm", "m.2", "pcie", "intel"];
/// Secondary label checks for fixed drives
pub const FIXED_LABEL_SSD: &[&str] = &["ssd", "samsung"];

/// Labels the RAM volume scan treats as memory-backed
pub const RAM_SCAN_LABEL: &[&str] = &["ram", "temp", "volatile", "memory"];
/// Management-instrumentation descriptions of memory-backed disks
pub const RAM_DESCRIPTION: &[&str] = &["ram", "memory", "virtual"];
/// Device friendly names of memory-backed disks
pub const RAM_FRIENDLY_NAME: &[&str] = &["ram", "imdisk", "memory"];

/// Friendly names that mark a RAID set as SATA/rotational rather than NVMe
pub const RAID_SATA_NAMES: &[&str] = &["ssd", "sata", "seagate", "western", "wd", "hitachi"];

static OPAQUE_DEVICE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\\device\\[0-9a-f]+$").ok());

/// Check whether `haystack` contains any of `keywords`, ignoring case
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

/// Device paths consisting only of `\Device\<hex>`, as created by some RAM disk drivers
pub fn is_opaque_device_path(device_path: &str) -> bool {
    OPAQUE_DEVICE
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(device_path.trim()))
}
