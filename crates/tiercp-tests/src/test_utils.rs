//! Scripted stand-ins for the operating system
//!
//! [`FakeProbe`] answers every [`VolumeProbe`] query from a table built in the
//! test, [`FakeSpace`] reports fixed capacities per path prefix, and
//! [`FakeRefiner`] counts how often the cache asks for a bus type.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tiercp_device::{BusTypeRefiner, DiskSpace, LogicalDisk, SpaceProbe, VolumeProbe};
use tiercp_types::{Detection, DriveLetter, Error, OsDriveType, Result, StorageClass};

/// One scripted volume
#[derive(Debug, Clone, Default)]
pub struct FakeVolume {
    /// Kernel device path
    pub device_path: Option<String>,
    /// Volume label
    pub label: Option<String>,
    /// OS drive-type flag
    pub drive_type: Option<OsDriveType>,
    /// Volume serial number
    pub serial: Option<u32>,
    /// Capacity and free space
    pub space: Option<DiskSpace>,
    /// Directory standing in for the volume root
    pub root: Option<PathBuf>,
}

impl FakeVolume {
    /// A fixed disk with a generic device path and no label
    pub fn fixed() -> Self {
        Self {
            device_path: Some(r"\Device\HarddiskVolume3".to_string()),
            label: Some(String::new()),
            drive_type: Some(OsDriveType::Fixed),
            ..Self::default()
        }
    }

    /// Set the device path
    pub fn device_path(mut self, path: &str) -> Self {
        self.device_path = Some(path.to_string());
        self
    }

    /// Set the volume label
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Set the drive type
    pub fn drive_type(mut self, drive_type: OsDriveType) -> Self {
        self.drive_type = Some(drive_type);
        self
    }

    /// Set the volume serial
    pub fn serial(mut self, serial: u32) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Set capacity and free space
    pub fn space(mut self, total: u64, free: u64) -> Self {
        self.space = Some(DiskSpace { total, free });
        self
    }

    /// Map the volume root onto a real directory
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// Volume probe answering from a fixed table
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    volumes: BTreeMap<DriveLetter, FakeVolume>,
    processes: Vec<String>,
    services: BTreeMap<String, String>,
    logical_disks: Option<Vec<LogicalDisk>>,
    device_names: Option<Vec<String>>,
}

impl FakeProbe {
    /// A probe with no volumes and every optional query failing
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume under `letter`
    pub fn volume(mut self, letter: char, volume: FakeVolume) -> Self {
        self.volumes.insert(letter_of(letter), volume);
        self
    }

    /// Mark a process image as running
    pub fn process(mut self, image_name: &str) -> Self {
        self.processes.push(image_name.to_lowercase());
        self
    }

    /// Script the status report of a driver service
    pub fn service(mut self, name: &str, status: &str) -> Self {
        self.services.insert(name.to_lowercase(), status.to_string());
        self
    }

    /// Script the management-instrumentation disk listing
    pub fn logical_disks(mut self, disks: Vec<LogicalDisk>) -> Self {
        self.logical_disks = Some(disks);
        self
    }

    /// Script the storage device friendly names
    pub fn device_names(mut self, names: &[&str]) -> Self {
        self.device_names = Some(names.iter().map(ToString::to_string).collect());
        self
    }

    fn get(&self, letter: DriveLetter) -> Option<&FakeVolume> {
        self.volumes.get(&letter)
    }
}

#[async_trait]
impl VolumeProbe for FakeProbe {
    async fn present_letters(&self) -> Vec<DriveLetter> {
        self.volumes.keys().copied().collect()
    }

    async fn device_path(&self, letter: DriveLetter) -> Option<String> {
        self.get(letter)?.device_path.clone()
    }

    async fn volume_label(&self, letter: DriveLetter) -> Option<String> {
        self.get(letter)?.label.clone()
    }

    async fn drive_type(&self, letter: DriveLetter) -> Option<OsDriveType> {
        match self.get(letter) {
            Some(volume) => volume.drive_type,
            None => Some(OsDriveType::NoRootDir),
        }
    }

    async fn volume_serial(&self, letter: DriveLetter) -> Option<u32> {
        self.get(letter)?.serial
    }

    async fn disk_space(&self, letter: DriveLetter) -> Option<DiskSpace> {
        self.get(letter)?.space
    }

    async fn process_running(&self, image_name: &str) -> Option<bool> {
        Some(self.processes.contains(&image_name.to_lowercase()))
    }

    async fn service_status(&self, service: &str) -> Option<String> {
        self.services.get(&service.to_lowercase()).cloned()
    }

    async fn logical_disks(&self) -> Option<Vec<LogicalDisk>> {
        self.logical_disks.clone()
    }

    async fn storage_device_names(&self) -> Option<Vec<String>> {
        self.device_names.clone()
    }

    fn mount_root(&self, letter: DriveLetter) -> PathBuf {
        self.get(letter)
            .and_then(|volume| volume.root.clone())
            .unwrap_or_else(|| letter.root())
    }
}

/// Free-space source keyed by path prefix; the longest matching prefix wins
#[derive(Debug, Clone, Default)]
pub struct FakeSpace {
    entries: Vec<(PathBuf, DiskSpace)>,
}

impl FakeSpace {
    /// No known volumes; every query fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `free` of `total` bytes for everything under `prefix`
    pub fn with(mut self, prefix: impl Into<PathBuf>, total: u64, free: u64) -> Self {
        self.entries.push((prefix.into(), DiskSpace { total, free }));
        self
    }
}

impl SpaceProbe for FakeSpace {
    fn space_for(&self, path: &Path) -> Result<DiskSpace> {
        self.entries
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.components().count())
            .map(|(_, space)| *space)
            .ok_or_else(|| Error::device_detection(format!("no scripted space for {}", path.display())))
    }
}

/// Refiner returning a fixed answer and counting calls
#[derive(Debug)]
pub struct FakeRefiner {
    answer: Detection<StorageClass>,
    calls: AtomicUsize,
}

impl FakeRefiner {
    /// Always answer `answer`
    pub fn new(answer: Detection<StorageClass>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    /// Refiner that never finds a bus type
    pub fn silent() -> Self {
        Self::new(Detection::NotFound)
    }

    /// Number of refinement calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusTypeRefiner for FakeRefiner {
    async fn refine(&self, _letter: DriveLetter) -> Detection<StorageClass> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Parse a letter known to be valid
pub fn letter_of(c: char) -> DriveLetter {
    DriveLetter::new(c).unwrap_or_else(|| panic!("invalid drive letter {c:?}"))
}

/// Deterministic file content with some structure
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect()
}

/// Write a file of `size` bytes at `relative` under `dir`, creating parents
pub fn create_test_file(dir: &Path, relative: &str, size: usize) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, generate_test_data(size)).expect("Failed to write test file");
    path
}

/// Build a small tree of files and return `(relative path, size)` pairs
pub fn create_test_tree(dir: &Path) -> Vec<(&'static str, usize)> {
    let files = vec![
        ("small.txt", 1024),
        ("medium.bin", 64 * 1024),
        ("sub/nested.bin", 200 * 1024),
        ("sub/deeper/tail.txt", 333),
    ];
    for (relative, size) in &files {
        create_test_file(dir, relative, *size);
    }
    files
}

/// Names of entries directly inside `dir`
pub fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// A temporary directory pair standing in for a RAM volume and a work area
pub struct Workspace {
    /// Holds the directories alive
    pub temp: TempDir,
    /// RAM volume root
    pub ram: PathBuf,
    /// Ordinary disk area
    pub disk: PathBuf,
}

impl Workspace {
    /// Create both directories
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let ram = temp.path().join("ram");
        let disk = temp.path().join("disk");
        fs::create_dir_all(&ram).expect("Failed to create ram dir");
        fs::create_dir_all(&disk).expect("Failed to create disk dir");
        Self { temp, ram, disk }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
