//! Core data types for TierCP
//!
//! This module provides the fundamental data types used throughout the TierCP workspace:
//! drive identities, storage classes, detection outcomes, progress snapshots and
//! transfer reports.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File size in bytes
pub type FileSize = u64;

/// A mounted volume root identified by a single letter, `A` through `Z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct DriveLetter(char);

impl DriveLetter {
    /// Create a drive letter, normalizing to upper case
    pub fn new(letter: char) -> Option<Self> {
        letter
            .is_ascii_alphabetic()
            .then(|| Self(letter.to_ascii_uppercase()))
    }

    /// Extract the drive letter prefix of a path such as `C:\data` or `\\?\D:\x`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let text = path.as_ref().to_string_lossy();
        let text = text.strip_prefix(r"\\?\").unwrap_or(&text);
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), Some(':')) => Self::new(letter),
            _ => None,
        }
    }

    /// All letters in order, `A` through `Z`
    pub fn all() -> impl Iterator<Item = Self> {
        ('A'..='Z').map(Self)
    }

    /// The letter as an upper-case character
    pub fn as_char(self) -> char {
        self.0
    }

    /// Letters historically reserved for floppy drives
    pub fn is_floppy(self) -> bool {
        matches!(self.0, 'A' | 'B')
    }

    /// Root path of the volume, `X:\`
    pub fn root(self) -> PathBuf {
        PathBuf::from(format!("{}:\\", self.0))
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DriveLetter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(['\\', '/']).trim_end_matches(':');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                Self::new(letter).ok_or_else(|| format!("Invalid drive letter: {s}"))
            }
            _ => Err(format!("Invalid drive letter: {s}")),
        }
    }
}

impl TryFrom<String> for DriveLetter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DriveLetter> for String {
    fn from(letter: DriveLetter) -> Self {
        letter.0.to_string()
    }
}

/// Storage class assigned to a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StorageClass {
    /// Volatile-memory-backed volume
    Ram,
    /// Ultra-fast attached storage
    Nvme,
    /// Fast attached storage
    Ssd,
    /// Removable storage
    Usb,
    /// Network storage
    Nas,
    /// Rotational storage
    #[default]
    Hdd,
}

impl StorageClass {
    /// Every class, fastest first
    pub const ALL: [Self; 6] = [
        Self::Ram,
        Self::Nvme,
        Self::Ssd,
        Self::Usb,
        Self::Nas,
        Self::Hdd,
    ];

    /// Lower-case identifier used in config files and the persisted cache
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ram => "ram",
            Self::Nvme => "nvme",
            Self::Ssd => "ssd",
            Self::Usb => "usb",
            Self::Nas => "nas",
            Self::Hdd => "hdd",
        }
    }

    /// Whether a cheap classification of this class is worth refining
    pub fn is_ambiguous(self) -> bool {
        matches!(self, Self::Ssd | Self::Hdd)
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ram" => Ok(Self::Ram),
            "nvme" => Ok(Self::Nvme),
            "ssd" => Ok(Self::Ssd),
            "usb" => Ok(Self::Usb),
            "nas" => Ok(Self::Nas),
            "hdd" => Ok(Self::Hdd),
            other => Err(format!("Unknown storage class: {other}")),
        }
    }
}

/// Coarse drive-type flag reported by the operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OsDriveType {
    /// The type could not be determined
    Unknown,
    /// The root path is invalid
    NoRootDir,
    /// Removable media
    Removable,
    /// Fixed media
    Fixed,
    /// Remote (network) drive
    Remote,
    /// Optical drive
    CdRom,
    /// RAM disk
    RamDisk,
}

impl OsDriveType {
    /// Map the numeric code returned by `GetDriveTypeW`
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::NoRootDir,
            2 => Self::Removable,
            3 => Self::Fixed,
            4 => Self::Remote,
            5 => Self::CdRom,
            6 => Self::RamDisk,
            _ => Self::Unknown,
        }
    }
}

/// Raw OS facts about one drive letter
///
/// A `None` field means the probe for that field failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceDescriptor {
    /// Drive letter
    pub letter: DriveLetter,
    /// Kernel device path, e.g. `\Device\HarddiskVolume3`
    pub device_path: Option<String>,
    /// Volume label
    pub volume_label: Option<String>,
    /// OS drive-type flag
    pub drive_type: Option<OsDriveType>,
}

impl DeviceDescriptor {
    /// Descriptor with every probe missing
    pub fn empty(letter: DriveLetter) -> Self {
        Self {
            letter,
            device_path: None,
            volume_label: None,
            drive_type: None,
        }
    }
}

/// Outcome of a single detection step
///
/// `NotFound` means the step ran and ruled itself out; `Inconclusive` means it
/// could not run (missing input, probe failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection<T> {
    /// The step produced a result
    Found(T),
    /// The step ran and found nothing
    NotFound,
    /// The step could not decide
    Inconclusive(String),
}

impl<T> Detection<T> {
    /// Convert into an `Option`, discarding the reason
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound | Self::Inconclusive(_) => None,
        }
    }

    /// Whether the step produced a result
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Build an inconclusive outcome
    pub fn inconclusive<S: Into<String>>(reason: S) -> Self {
        Self::Inconclusive(reason.into())
    }
}

/// Accurate-tier cache entry for one letter
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassificationEntry {
    /// Drive letter
    pub letter: DriveLetter,
    /// Stored class
    pub class: StorageClass,
    /// Volume serial number at the time of classification
    pub volume_serial: Option<u32>,
    /// Whether the class came from a user override
    pub is_override: bool,
}

/// Snapshot of the detected RAM volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RamVolumeInfo {
    /// Detected letter, if any
    pub letter: Option<DriveLetter>,
    /// Root path of the detected volume
    pub root: Option<PathBuf>,
    /// Capacity in bytes
    pub total_bytes: u64,
    /// Free space in bytes
    pub free_bytes: u64,
    /// Which detection strategies matched
    pub detection_tags: Vec<String>,
}

/// Copy or move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperationKind {
    /// Source is retained
    Copy,
    /// Source is removed after each successful file
    Move,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Move => f.write_str("move"),
        }
    }
}

/// How a directory operation reacts to a failed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailurePolicy {
    /// Stop at the first failed file
    #[default]
    AbortOnFirst,
    /// Skip failed files and report them at the end
    SkipAndReport,
}

/// Point-in-time view of a running operation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressSnapshot {
    /// File currently being transferred, or a scan label
    pub current: String,
    /// Bytes the operation will process in total
    pub total_bytes: u64,
    /// Bytes processed so far
    pub processed_bytes: u64,
    /// Average speed since the operation started
    pub bytes_per_second: f64,
    /// 1-based index of the current file
    pub file_index: u64,
    /// Number of files in the operation
    pub file_count: u64,
}

impl ProgressSnapshot {
    /// Overall progress in percent
    pub fn percentage(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// A file that failed during a directory operation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileFailure {
    /// Source file
    pub source: PathBuf,
    /// Failure description
    pub message: String,
}

/// Summary of a finished operation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferReport {
    /// Copy or move
    pub kind: OperationKind,
    /// Files written to the destination
    pub files_transferred: u64,
    /// Payload bytes written to the destination
    pub bytes_transferred: u64,
    /// Whether the staged strategy was used
    pub staged: bool,
    /// Wall-clock duration
    pub duration: Duration,
    /// Files skipped under the skip-and-report policy
    pub failures: Vec<FileFailure>,
}

impl TransferReport {
    /// Average destination throughput
    pub fn transfer_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_transferred as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
