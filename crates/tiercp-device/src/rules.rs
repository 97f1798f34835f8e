//! Classification rule cascade
//!
//! Each rule inspects one facet of a [`DeviceDescriptor`] and either decides the
//! storage class or defers to the next rule. A rule whose input is missing is
//! inconclusive rather than negative.

use crate::keywords;
use tiercp_types::{DeviceDescriptor, Detection, OsDriveType, StorageClass};

/// A single step of the classification cascade
pub trait ClassificationRule: Send + Sync {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    /// Evaluate the rule against a descriptor
    fn evaluate(&self, descriptor: &DeviceDescriptor) -> Detection<StorageClass>;
}

fn match_families(text: &str, families: &[(&[&str], StorageClass)]) -> Detection<StorageClass> {
    families
        .iter()
        .find(|(words, _)| keywords::contains_any(text, words))
        .map_or(Detection::NotFound, |(_, class)| Detection::Found(*class))
}

/// Human-readable volume label
#[derive(Debug, Default)]
pub struct VolumeLabelRule;

impl ClassificationRule for VolumeLabelRule {
    fn name(&self) -> &'static str {
        "volume-label"
    }

    fn evaluate(&self, descriptor: &DeviceDescriptor) -> Detection<StorageClass> {
        let Some(label) = descriptor.volume_label.as_deref() else {
            return Detection::inconclusive("volume label unavailable");
        };
        match_families(
            label,
            &[
                (keywords::LABEL_RAM, StorageClass::Ram),
                (keywords::LABEL_NVME, StorageClass::Nvme),
                (keywords::LABEL_USB, StorageClass::Usb),
            ],
        )
    }
}

/// Driver and vendor keywords in the kernel device path
#[derive(Debug, Default)]
pub struct DevicePathRule;

impl ClassificationRule for DevicePathRule {
    fn name(&self) -> &'static str {
        "device-path"
    }

    fn evaluate(&self, descriptor: &DeviceDescriptor) -> Detection<StorageClass> {
        let Some(path) = descriptor.device_path.as_deref() else {
            return Detection::inconclusive("device path unavailable");
        };
        match_families(
            path,
            &[
                (keywords::DEVICE_RAM, StorageClass::Ram),
                (keywords::DEVICE_NVME, StorageClass::Nvme),
                (keywords::DEVICE_SSD, StorageClass::Ssd),
                (keywords::DEVICE_USB, StorageClass::Usb),
                (keywords::DEVICE_NAS, StorageClass::Nas),
                (keywords::DEVICE_HDD, StorageClass::Hdd),
            ],
        )
    }
}

/// Device paths of the form `\Device\<hex>`
#[derive(Debug, Default)]
pub struct OpaqueDevicePathRule;

impl ClassificationRule for OpaqueDevicePathRule {
    fn name(&self) -> &'static str {
        "opaque-device-path"
    }

    fn evaluate(&self, descriptor: &DeviceDescriptor) -> Detection<StorageClass> {
        match descriptor.device_path.as_deref() {
            Some(path) if keywords::is_opaque_device_path(path) => {
                Detection::Found(StorageClass::Ram)
            }
            Some(_) => Detection::NotFound,
            None => Detection::inconclusive("device path unavailable"),
        }
    }
}

/// OS drive-type flag, with a secondary label check for fixed drives
#[derive(Debug, Default)]
pub struct DriveTypeRule;

impl ClassificationRule for DriveTypeRule {
    fn name(&self) -> &'static str {
        "drive-type"
    }

    fn evaluate(&self, descriptor: &DeviceDescriptor) -> Detection<StorageClass> {
        match descriptor.drive_type {
            Some(OsDriveType::Removable) => Detection::Found(StorageClass::Usb),
            Some(OsDriveType::Fixed) => {
                let label = descriptor.volume_label.as_deref().unwrap_or_default();
                match match_families(
                    label,
                    &[
                        (keywords::FIXED_LABEL_USB, StorageClass::Usb),
                        (keywords::FIXED_LABEL_NVME, StorageClass::Nvme),
                        (keywords::FIXED_LABEL_SSD, StorageClass::Ssd),
                    ],
                ) {
                    found @ Detection::Found(_) => found,
                    _ => Detection::Found(StorageClass::Ssd),
                }
            }
            Some(_) => Detection::NotFound,
            None => Detection::inconclusive("drive type unavailable"),
        }
    }
}

/// The cascade in evaluation order
pub fn default_rules() -> Vec<Box<dyn ClassificationRule>> {
    vec![
        Box::new(VolumeLabelRule),
        Box::new(DevicePathRule),
        Box::new(OpaqueDevicePathRule),
        Box::new(DriveTypeRule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tiercp_types::DriveLetter;

    fn descriptor(
        path: Option<&str>,
        label: Option<&str>,
        drive_type: Option<OsDriveType>,
    ) -> DeviceDescriptor {
        DeviceDescriptor {
            letter: DriveLetter::new('E').unwrap(),
            device_path: path.map(str::to_string),
            volume_label: label.map(str::to_string),
            drive_type,
        }
    }

    #[rstest]
    #[case("RAMDISK", StorageClass::Ram)]
    #[case("Fast NVMe", StorageClass::Nvme)]
    #[case("Kingston DT", StorageClass::Usb)]
    fn test_label_rule(#[case] label: &str, #[case] expected: StorageClass) {
        let result = VolumeLabelRule.evaluate(&descriptor(None, Some(label), None));
        assert_eq!(result, Detection::Found(expected));
    }

    #[test]
    fn test_label_rule_missing_label_is_inconclusive() {
        let result = VolumeLabelRule.evaluate(&descriptor(None, None, None));
        assert!(matches!(result, Detection::Inconclusive(_)));
        let result = VolumeLabelRule.evaluate(&descriptor(None, Some("Data"), None));
        assert_eq!(result, Detection::NotFound);
    }

    #[rstest]
    #[case(r"\Device\ImDisk0", StorageClass::Ram)]
    #[case(r"\Device\Nvme0", StorageClass::Nvme)]
    #[case(r"\Device\Solid State 1", StorageClass::Ssd)]
    #[case(r"\Device\USBSTOR\Disk", StorageClass::Usb)]
    #[case(r"\Device\Mup\;Z:", StorageClass::Nas)]
    #[case(r"\Device\Seagate2", StorageClass::Hdd)]
    fn test_device_path_rule(#[case] path: &str, #[case] expected: StorageClass) {
        let result = DevicePathRule.evaluate(&descriptor(Some(path), None, None));
        assert_eq!(result, Detection::Found(expected));
    }

    #[test]
    fn test_generic_device_path_not_found() {
        let generic = descriptor(Some(r"\Device\HarddiskVolume3"), None, None);
        assert_eq!(DevicePathRule.evaluate(&generic), Detection::NotFound);
        assert_eq!(OpaqueDevicePathRule.evaluate(&generic), Detection::NotFound);
    }

    #[test]
    fn test_opaque_device_path_rule() {
        let opaque = descriptor(Some(r"\Device\00000a1f"), None, None);
        assert_eq!(
            OpaqueDevicePathRule.evaluate(&opaque),
            Detection::Found(StorageClass::Ram)
        );
    }

    #[rstest]
    #[case(Some(OsDriveType::Removable), None, Detection::Found(StorageClass::Usb))]
    #[case(Some(OsDriveType::Fixed), Some("Transcend"), Detection::Found(StorageClass::Usb))]
    #[case(Some(OsDriveType::Fixed), Some("M.2 Boot"), Detection::Found(StorageClass::Nvme))]
    #[case(Some(OsDriveType::Fixed), Some("Samsung"), Detection::Found(StorageClass::Ssd))]
    #[case(Some(OsDriveType::Fixed), Some("Data"), Detection::Found(StorageClass::Ssd))]
    #[case(Some(OsDriveType::Fixed), None, Detection::Found(StorageClass::Ssd))]
    #[case(Some(OsDriveType::CdRom), None, Detection::NotFound)]
    fn test_drive_type_rule(
        #[case] drive_type: Option<OsDriveType>,
        #[case] label: Option<&str>,
        #[case] expected: Detection<StorageClass>,
    ) {
        let result = DriveTypeRule.evaluate(&descriptor(None, label, drive_type));
        assert_eq!(result, expected);
    }
}
