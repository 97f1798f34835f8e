//! Drive enumeration and classification
//!
//! [`DriveClassifier`] turns OS volume facts into a [`StorageClass`] by running
//! the rule cascade from [`crate::rules`]. Classification never fails: when no
//! rule decides, the volume is treated as rotational storage.

use crate::probe::SharedProbe;
use crate::rules::{default_rules, ClassificationRule};
use std::collections::BTreeMap;
use tiercp_types::{DeviceDescriptor, Detection, DriveLetter, StorageClass};
use tracing::{debug, trace};

/// Rule-driven storage classifier
pub struct DriveClassifier {
    probe: SharedProbe,
    rules: Vec<Box<dyn ClassificationRule>>,
}

impl std::fmt::Debug for DriveClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClassifier")
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DriveClassifier {
    /// Create a classifier with the default rule cascade
    pub fn new(probe: SharedProbe) -> Self {
        Self::with_rules(probe, default_rules())
    }

    /// Create a classifier with a custom rule cascade
    pub fn with_rules(probe: SharedProbe, rules: Vec<Box<dyn ClassificationRule>>) -> Self {
        Self { probe, rules }
    }

    /// The probe this classifier reads from
    pub fn probe(&self) -> &SharedProbe {
        &self.probe
    }

    /// Gather the classification inputs for a letter
    pub async fn describe(&self, letter: DriveLetter) -> DeviceDescriptor {
        self.probe.describe(letter).await
    }

    /// Apply the rule cascade to an already gathered descriptor
    pub fn classify_descriptor(&self, descriptor: &DeviceDescriptor) -> StorageClass {
        for rule in &self.rules {
            match rule.evaluate(descriptor) {
                Detection::Found(class) => {
                    trace!(
                        "Rule {} classified {} as {}",
                        rule.name(),
                        descriptor.letter,
                        class
                    );
                    return class;
                }
                Detection::NotFound => {}
                Detection::Inconclusive(reason) => {
                    trace!("Rule {} inconclusive for {}: {}", rule.name(), descriptor.letter, reason);
                }
            }
        }
        StorageClass::Hdd
    }

    /// Classify a letter
    pub async fn classify(&self, letter: DriveLetter) -> StorageClass {
        let descriptor = self.describe(letter).await;
        self.classify_descriptor(&descriptor)
    }

    /// Classify a letter only if it currently has a mounted volume
    pub async fn classify_present(&self, letter: DriveLetter) -> Option<StorageClass> {
        if self.probe.exists(letter).await {
            Some(self.classify(letter).await)
        } else {
            None
        }
    }

    /// Classify every present letter, skipping the floppy letters
    pub async fn scan_all(&self) -> BTreeMap<DriveLetter, StorageClass> {
        let mut drives = BTreeMap::new();
        for letter in self.probe.present_letters().await {
            if letter.is_floppy() {
                continue;
            }
            drives.insert(letter, self.classify(letter).await);
        }
        debug!("Scanned {} drives", drives.len());
        drives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::NoVolumes;
    use std::sync::Arc;
    use tiercp_types::OsDriveType;

    fn letter(c: char) -> DriveLetter {
        DriveLetter::new(c).unwrap()
    }

    #[test]
    fn test_label_beats_device_path() {
        let classifier = DriveClassifier::new(Arc::new(NoVolumes));
        let descriptor = DeviceDescriptor {
            letter: letter('R'),
            device_path: Some(r"\Device\HarddiskVolume7".to_string()),
            volume_label: Some("RamDisk".to_string()),
            drive_type: Some(OsDriveType::Fixed),
        };
        assert_eq!(classifier.classify_descriptor(&descriptor), StorageClass::Ram);
    }

    #[test]
    fn test_fallback_is_hdd() {
        let classifier = DriveClassifier::new(Arc::new(NoVolumes));
        let descriptor = DeviceDescriptor {
            letter: letter('Z'),
            device_path: Some(r"\Device\CdRom0".to_string()),
            volume_label: Some(String::new()),
            drive_type: Some(OsDriveType::CdRom),
        };
        assert_eq!(classifier.classify_descriptor(&descriptor), StorageClass::Hdd);
    }

    #[test]
    fn test_all_probes_failed_is_hdd() {
        let classifier = DriveClassifier::new(Arc::new(NoVolumes));
        let descriptor = DeviceDescriptor::empty(letter('Q'));
        assert_eq!(classifier.classify_descriptor(&descriptor), StorageClass::Hdd);
    }

    #[tokio::test]
    async fn test_scan_all_without_volumes() {
        let classifier = DriveClassifier::new(Arc::new(NoVolumes));
        assert!(classifier.scan_all().await.is_empty());
        assert_eq!(classifier.classify_present(letter('C')).await, None);
        assert_eq!(classifier.classify(letter('C')).await, StorageClass::Hdd);
    }
}
