//! Ephemeral-memory (RAM) volume detection
//!
//! [`RamDriveDetector`] finds the single drive letter, if any, that is backed by
//! volatile memory. It runs an ordered list of independent [`RamDriveStrategy`]
//! implementations and stops at the first hit. Every strategy fails soft: a probe
//! error is logged and the cascade moves on.

use crate::keywords;
use crate::probe::{SharedProbe, VolumeProbe};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tiercp_types::{Detection, DriveLetter, OsDriveType, RamVolumeInfo};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

/// Smallest capacity accepted by the product profile check (100MB)
pub const MIN_PROFILE_CAPACITY: u64 = 100 * 1024 * 1024;
/// Largest capacity accepted by the product profile check (100GB)
pub const MAX_PROFILE_CAPACITY: u64 = 100 * 1024 * 1024 * 1024;

/// A positive detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamHit {
    /// Letter of the volume, when the strategy can tell
    pub letter: Option<DriveLetter>,
    /// Provenance tag for diagnostics
    pub tag: String,
}

impl RamHit {
    fn new(letter: Option<DriveLetter>, tag: impl Into<String>) -> Self {
        Self {
            letter,
            tag: tag.into(),
        }
    }
}

/// One independent way of finding a RAM volume
#[async_trait]
pub trait RamDriveStrategy: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Run the strategy
    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit>;
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Device path and label keyword scan across present letters
#[derive(Debug, Default)]
pub struct KeywordScanStrategy;

#[async_trait]
impl RamDriveStrategy for KeywordScanStrategy {
    fn name(&self) -> &'static str {
        "keyword-scan"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        for letter in probe.present_letters().await {
            if letter.is_floppy() {
                continue;
            }

            let path = probe.device_path(letter).await;
            if let Some(path) = &path {
                if keywords::contains_any(path, keywords::DEVICE_RAM) {
                    return Detection::Found(RamHit::new(
                        Some(letter),
                        format!("QueryDosDevice ({})", truncate(path, 50)),
                    ));
                }
            }

            if let Some(label) = probe.volume_label(letter).await {
                if keywords::contains_any(&label, keywords::RAM_SCAN_LABEL) {
                    return Detection::Found(RamHit::new(
                        Some(letter),
                        format!("Volume-Label ({label})"),
                    ));
                }
            }

            if let Some(path) = path {
                let lower = path.to_lowercase();
                if lower.contains("volume")
                    && !lower.contains("harddisk")
                    && probe.drive_type(letter).await == Some(OsDriveType::Fixed)
                {
                    return Detection::Found(RamHit::new(Some(letter), "Fixed-VirtualPath"));
                }
            }
        }
        Detection::NotFound
    }
}

/// The OS reports the drive type as a RAM disk
#[derive(Debug, Default)]
pub struct DriveTypeStrategy;

#[async_trait]
impl RamDriveStrategy for DriveTypeStrategy {
    fn name(&self) -> &'static str {
        "drive-type"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        for letter in probe.present_letters().await {
            if probe.drive_type(letter).await == Some(OsDriveType::RamDisk) {
                return Detection::Found(RamHit::new(Some(letter), "API-GetDriveType"));
            }
        }
        Detection::NotFound
    }
}

/// A known RAM disk product is running and a volume fits its usage profile
#[derive(Debug)]
pub struct KnownProductStrategy {
    image_name: String,
    tag: String,
}

impl KnownProductStrategy {
    /// Watch for the given process image name
    pub fn new(image_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            tag: tag.into(),
        }
    }
}

impl Default for KnownProductStrategy {
    fn default() -> Self {
        Self::new("RAMDisk.exe", "SoftPerfect-RamDisk")
    }
}

#[async_trait]
impl RamDriveStrategy for KnownProductStrategy {
    fn name(&self) -> &'static str {
        "known-product"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        match probe.process_running(&self.image_name).await {
            Some(true) => {}
            Some(false) => return Detection::NotFound,
            None => return Detection::inconclusive("process list unavailable"),
        }

        for letter in probe.present_letters().await {
            if letter.is_floppy() {
                continue;
            }
            let Some(space) = probe.disk_space(letter).await else {
                continue;
            };
            let plausible_size =
                (MIN_PROFILE_CAPACITY..=MAX_PROFILE_CAPACITY).contains(&space.total);
            if !plausible_size || space.used_ratio() >= 0.1 {
                continue;
            }

            let confirmed = probe
                .volume_label(letter)
                .await
                .is_some_and(|label| keywords::contains_any(&label, keywords::LABEL_RAM));
            let tag = if confirmed {
                format!("{} (label confirmed)", self.tag)
            } else {
                self.tag.clone()
            };
            return Detection::Found(RamHit::new(Some(letter), tag));
        }
        Detection::NotFound
    }
}

/// A RAM disk driver service is installed
#[derive(Debug)]
pub struct DriverServiceStrategy {
    service: String,
}

impl DriverServiceStrategy {
    /// Query the given service name
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for DriverServiceStrategy {
    fn default() -> Self {
        Self::new("imdisk")
    }
}

#[async_trait]
impl RamDriveStrategy for DriverServiceStrategy {
    fn name(&self) -> &'static str {
        "driver-service"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        let Some(status) = probe.service_status(&self.service).await else {
            return Detection::inconclusive("service query failed");
        };
        let status = status.to_uppercase();
        if status.contains("RUNNING") || status.contains("STOPPED") {
            Detection::Found(RamHit::new(None, format!("{}-Service", self.service)))
        } else {
            Detection::NotFound
        }
    }
}

/// Management-instrumentation logical disk descriptions
#[derive(Debug, Default)]
pub struct ManagementQueryStrategy;

#[async_trait]
impl RamDriveStrategy for ManagementQueryStrategy {
    fn name(&self) -> &'static str {
        "management-query"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        let Some(disks) = probe.logical_disks().await else {
            return Detection::inconclusive("logical disk query failed");
        };
        disks
            .into_iter()
            .find(|disk| keywords::contains_any(&disk.description, keywords::RAM_DESCRIPTION))
            .map_or(Detection::NotFound, |disk| {
                Detection::Found(RamHit::new(disk.letter, "WMI-detected"))
            })
    }
}

static EMBEDDED_LETTER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z]):?\)").ok());

/// Extract the last `(X)` or `(X:)` letter embedded in a device name
pub fn embedded_letter(name: &str) -> Option<DriveLetter> {
    let pattern = EMBEDDED_LETTER.as_ref()?;
    pattern
        .captures_iter(name)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .and_then(DriveLetter::new)
}

/// Storage device-class enumeration by friendly name
#[derive(Debug, Default)]
pub struct DeviceClassStrategy;

#[async_trait]
impl RamDriveStrategy for DeviceClassStrategy {
    fn name(&self) -> &'static str {
        "device-class"
    }

    async fn detect(&self, probe: &dyn VolumeProbe) -> Detection<RamHit> {
        let Some(names) = probe.storage_device_names().await else {
            return Detection::inconclusive("device enumeration failed");
        };
        names
            .iter()
            .find(|name| keywords::contains_any(name, keywords::RAM_FRIENDLY_NAME))
            .map_or(Detection::NotFound, |name| {
                Detection::Found(RamHit::new(embedded_letter(name), "SetupAPI"))
            })
    }
}

/// The strategies in priority order
pub fn default_strategies() -> Vec<Box<dyn RamDriveStrategy>> {
    vec![
        Box::new(KeywordScanStrategy),
        Box::new(DriveTypeStrategy),
        Box::new(KnownProductStrategy::default()),
        Box::new(DriverServiceStrategy::default()),
        Box::new(ManagementQueryStrategy),
        Box::new(DeviceClassStrategy),
    ]
}

#[derive(Debug, Default)]
struct DetectorState {
    attempted: bool,
    found: bool,
    letter: Option<DriveLetter>,
    tags: Vec<String>,
}

/// Detector for the RAM-backed volume
pub struct RamDriveDetector {
    probe: SharedProbe,
    strategies: Vec<Box<dyn RamDriveStrategy>>,
    state: RwLock<DetectorState>,
}

impl std::fmt::Debug for RamDriveDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamDriveDetector")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl RamDriveDetector {
    /// Create a detector with the default strategy order
    pub fn new(probe: SharedProbe) -> Self {
        Self::with_strategies(probe, default_strategies())
    }

    /// Create a detector with a custom strategy order
    pub fn with_strategies(probe: SharedProbe, strategies: Vec<Box<dyn RamDriveStrategy>>) -> Self {
        Self {
            probe,
            strategies,
            state: RwLock::new(DetectorState::default()),
        }
    }

    /// Detect the RAM volume
    ///
    /// Returns immediately when a previous detection found a letter that still
    /// exists; otherwise the cascade runs again from scratch.
    pub async fn detect(&self) -> bool {
        {
            let state = self.state.read().await;
            if state.attempted {
                if let Some(letter) = state.letter {
                    if self.probe.exists(letter).await {
                        return true;
                    }
                }
            }
        }
        self.run_cascade().await
    }

    /// Forget any previous result and detect again
    pub async fn refresh(&self) -> bool {
        *self.state.write().await = DetectorState::default();
        self.run_cascade().await
    }

    async fn run_cascade(&self) -> bool {
        let mut state = self.state.write().await;
        *state = DetectorState {
            attempted: true,
            ..DetectorState::default()
        };

        for strategy in &self.strategies {
            match strategy.detect(self.probe.as_ref()).await {
                Detection::Found(hit) => {
                    info!(
                        "RAM volume detected by {}: letter={:?} ({})",
                        strategy.name(),
                        hit.letter.map(DriveLetter::as_char),
                        hit.tag
                    );
                    state.found = true;
                    state.letter = hit.letter;
                    state.tags.push(hit.tag);
                    return true;
                }
                Detection::NotFound => trace!("RAM strategy {} found nothing", strategy.name()),
                Detection::Inconclusive(reason) => {
                    debug!("RAM strategy {} inconclusive: {}", strategy.name(), reason);
                }
            }
        }
        debug!("No RAM volume detected");
        false
    }

    /// The detected letter, running detection first if it never ran
    pub async fn letter(&self) -> Option<DriveLetter> {
        let attempted = self.state.read().await.attempted;
        if !attempted {
            self.detect().await;
        }
        self.state.read().await.letter
    }

    /// Whether a RAM volume is present
    pub async fn is_available(&self) -> bool {
        self.detect().await
    }

    /// Provenance tags of the last successful detection
    pub async fn detection_tags(&self) -> Vec<String> {
        self.state.read().await.tags.clone()
    }

    /// Live `(free, total)` bytes of the RAM volume, zero when none is known
    pub async fn free_space(&self) -> (u64, u64) {
        let Some(letter) = self.letter().await else {
            return (0, 0);
        };
        self.probe
            .disk_space(letter)
            .await
            .map_or((0, 0), |space| (space.free, space.total))
    }

    /// Snapshot of the RAM volume, empty when none is known
    pub async fn info(&self) -> RamVolumeInfo {
        let Some(letter) = self.letter().await else {
            return RamVolumeInfo::default();
        };
        let (free_bytes, total_bytes) = self.free_space().await;
        RamVolumeInfo {
            letter: Some(letter),
            root: Some(self.probe.mount_root(letter)),
            total_bytes,
            free_bytes,
            detection_tags: self.detection_tags().await,
        }
    }
}
