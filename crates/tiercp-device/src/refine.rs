//! Bus-type refinement for ambiguous classifications
//!
//! The fast classifier cannot tell NVMe from SATA on a generic fixed volume. A
//! [`BusTypeRefiner`] asks the storage stack for the bus type of the disk behind
//! a letter. The call is slow (seconds) and may fail; callers bound it with a
//! timeout and treat any failure as inconclusive.

use crate::command::run_captured;
use crate::keywords;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tiercp_types::{Detection, DriveLetter, StorageClass};
use tracing::debug;

/// Default time budget for one refinement call
pub const DEFAULT_REFINE_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of an accurate storage class for one letter
#[async_trait]
pub trait BusTypeRefiner: Send + Sync {
    /// Query the bus type of the disk behind `letter`
    async fn refine(&self, letter: DriveLetter) -> Detection<StorageClass>;
}

/// Refiner that never decides; used where no storage query is available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefiner;

#[async_trait]
impl BusTypeRefiner for NoRefiner {
    async fn refine(&self, _letter: DriveLetter) -> Detection<StorageClass> {
        Detection::inconclusive("refinement disabled")
    }
}

/// Map a reported bus type and disk friendly name to a storage class
pub fn map_bus_type(bus_type: &str, friendly_name: &str) -> Option<StorageClass> {
    let bus = bus_type.trim().to_lowercase();
    match bus.as_str() {
        "nvme" => Some(StorageClass::Nvme),
        "usb" => Some(StorageClass::Usb),
        "ata" | "sata" | "atapi" | "scsi" => Some(StorageClass::Ssd),
        "raid" => {
            if keywords::contains_any(friendly_name, keywords::RAID_SATA_NAMES) {
                Some(StorageClass::Ssd)
            } else {
                Some(StorageClass::Nvme)
            }
        }
        "virtual" => Some(StorageClass::Ram),
        other if other.contains("raid") => Some(StorageClass::Ssd),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct DiskReport {
    #[serde(rename = "BusType", default)]
    bus_type: Option<serde_json::Value>,
    #[serde(rename = "FriendlyName", default)]
    friendly_name: Option<String>,
}

/// Parse the JSON disk report printed by the refinement command
pub fn parse_disk_report(output: &str) -> Detection<StorageClass> {
    let report: DiskReport = match serde_json::from_str(output.trim()) {
        Ok(report) => report,
        Err(e) => return Detection::inconclusive(format!("unparseable disk report: {e}")),
    };
    let Some(serde_json::Value::String(bus_type)) = report.bus_type else {
        return Detection::inconclusive("disk report has no textual bus type");
    };
    let friendly_name = report.friendly_name.unwrap_or_default();
    map_bus_type(&bus_type, &friendly_name)
        .map_or(Detection::NotFound, Detection::Found)
}

/// Refiner backed by PowerShell's storage cmdlets
#[derive(Debug, Clone)]
pub struct PowerShellRefiner {
    program: String,
    timeout: Duration,
}

impl PowerShellRefiner {
    /// Use `pwsh` with the default timeout
    pub fn new() -> Self {
        Self::with_program("pwsh", DEFAULT_REFINE_TIMEOUT)
    }

    /// Use a specific PowerShell executable and timeout
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn script(letter: DriveLetter) -> String {
        format!(
            "$disk = Get-Volume -DriveLetter {letter} -ErrorAction Stop | Get-Partition | Get-Disk; \
             @{{BusType=\"$($disk.BusType)\"; FriendlyName=$disk.FriendlyName}} | ConvertTo-Json"
        )
    }
}

impl Default for PowerShellRefiner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusTypeRefiner for PowerShellRefiner {
    async fn refine(&self, letter: DriveLetter) -> Detection<StorageClass> {
        let script = Self::script(letter);
        let output = run_captured(
            &self.program,
            &["-NoProfile", "-NonInteractive", "-Command", &script],
            self.timeout,
        )
        .await;
        match output {
            Detection::Found(stdout) => {
                let result = parse_disk_report(&stdout);
                debug!("Bus type refinement for {}: {:?}", letter, result);
                result
            }
            Detection::NotFound => Detection::NotFound,
            Detection::Inconclusive(reason) => Detection::Inconclusive(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("NVMe", "", Some(StorageClass::Nvme))]
    #[case("USB", "", Some(StorageClass::Usb))]
    #[case("SATA", "", Some(StorageClass::Ssd))]
    #[case("SCSI", "", Some(StorageClass::Ssd))]
    #[case("RAID", "Intel Raid 0 Volume", Some(StorageClass::Nvme))]
    #[case("RAID", "WDC WD40EFRX", Some(StorageClass::Ssd))]
    #[case("Virtual", "", Some(StorageClass::Ram))]
    #[case("Storage Spaces RAID", "", Some(StorageClass::Ssd))]
    #[case("SD", "", None)]
    #[case("Unknown", "", None)]
    fn test_map_bus_type(
        #[case] bus_type: &str,
        #[case] friendly_name: &str,
        #[case] expected: Option<StorageClass>,
    ) {
        assert_eq!(map_bus_type(bus_type, friendly_name), expected);
    }

    #[test]
    fn test_parse_disk_report() {
        let output = r#"{ "BusType": "NVMe", "FriendlyName": "Samsung SSD 990 PRO" }"#;
        assert_eq!(parse_disk_report(output), Detection::Found(StorageClass::Nvme));
    }

    #[test]
    fn test_parse_disk_report_failures() {
        assert!(matches!(parse_disk_report("not json"), Detection::Inconclusive(_)));
        assert!(matches!(
            parse_disk_report(r#"{ "BusType": 17 }"#),
            Detection::Inconclusive(_)
        ));
        assert_eq!(
            parse_disk_report(r#"{ "BusType": "SD", "FriendlyName": "Card" }"#),
            Detection::NotFound
        );
    }

    #[test]
    fn test_script_targets_letter() {
        let script = PowerShellRefiner::script(DriveLetter::new('d').unwrap());
        assert!(script.contains("-DriveLetter D"));
        assert!(script.contains("ConvertTo-Json"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_inconclusive() {
        let refiner =
            PowerShellRefiner::with_program("tiercp-no-such-shell", Duration::from_secs(1));
        let result = refiner.refine(DriveLetter::new('C').unwrap()).await;
        assert!(matches!(result, Detection::Inconclusive(_)));
    }
}
