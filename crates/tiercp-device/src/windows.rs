//! Windows volume probe
//!
//! Per-letter facts come from kernel32 (`GetLogicalDrives`, `QueryDosDeviceW`,
//! `GetVolumeInformationW`, `GetDriveTypeW`, `GetDiskFreeSpaceExW`). The slower
//! system-wide queries used only by the RAM volume cascade shell out to the
//! stock tools and are bounded by a timeout.

use crate::command::run_captured;
use crate::probe::{DiskSpace, LogicalDisk, VolumeProbe};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::time::Duration;
use tiercp_types::{DriveLetter, OsDriveType};
use tracing::trace;
use winapi::shared::minwindef::{DWORD, FALSE, MAX_PATH};
use winapi::shared::ntdef::ULARGE_INTEGER;
use winapi::um::fileapi::{
    GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDrives, GetVolumeInformationW, QueryDosDeviceW,
};

const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn from_wide(buffer: &[u16]) -> String {
    let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..end])
}

fn root_wide(letter: DriveLetter) -> Vec<u16> {
    wide(&format!("{}:\\", letter.as_char()))
}

struct VolumeInformation {
    label: String,
    serial: u32,
}

fn volume_information(letter: DriveLetter) -> Option<VolumeInformation> {
    let root = root_wide(letter);
    let mut label = vec![0u16; MAX_PATH + 1];
    let mut serial: DWORD = 0;

    let ok = unsafe {
        GetVolumeInformationW(
            root.as_ptr(),
            label.as_mut_ptr(),
            label.len() as DWORD,
            &mut serial,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
        )
    };
    if ok == FALSE {
        trace!("GetVolumeInformationW failed for {}", letter);
        return None;
    }
    Some(VolumeInformation {
        label: from_wide(&label),
        serial,
    })
}

/// Capacity of the volume holding `path`
pub fn disk_free_space(path: &Path) -> Option<DiskSpace> {
    let path_wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut available: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total_free: ULARGE_INTEGER = unsafe { std::mem::zeroed() };

    let ok = unsafe {
        GetDiskFreeSpaceExW(
            path_wide.as_ptr(),
            &mut available,
            &mut total,
            &mut total_free,
        )
    };
    if ok == FALSE {
        return None;
    }
    Some(DiskSpace {
        total: unsafe { *total.QuadPart() },
        free: unsafe { *available.QuadPart() },
    })
}

/// Parse `wmic logicaldisk ... /format:csv` output
pub fn parse_logical_disks(csv: &str) -> Vec<LogicalDisk> {
    let mut lines = csv.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split(',').collect();
    let name_idx = columns.iter().position(|c| c.eq_ignore_ascii_case("Name"));
    let desc_idx = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case("Description"));
    let (Some(name_idx), Some(desc_idx)) = (name_idx, desc_idx) else {
        return Vec::new();
    };

    lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            let description = fields.get(desc_idx)?.to_string();
            let letter = fields
                .get(name_idx)
                .and_then(|name| name.parse::<DriveLetter>().ok());
            Some(LogicalDisk {
                letter,
                description,
            })
        })
        .collect()
}

/// [`VolumeProbe`] backed by the Win32 API
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProbe;

impl WindowsProbe {
    /// Create the probe
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VolumeProbe for WindowsProbe {
    async fn present_letters(&self) -> Vec<DriveLetter> {
        let mask = unsafe { GetLogicalDrives() };
        DriveLetter::all()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, letter)| letter)
            .collect()
    }

    async fn device_path(&self, letter: DriveLetter) -> Option<String> {
        let name = wide(&format!("{}:", letter.as_char()));
        let mut buffer = vec![0u16; 1024];
        let written =
            unsafe { QueryDosDeviceW(name.as_ptr(), buffer.as_mut_ptr(), buffer.len() as DWORD) };
        if written == 0 {
            trace!("QueryDosDeviceW failed for {}", letter);
            return None;
        }
        Some(from_wide(&buffer))
    }

    async fn volume_label(&self, letter: DriveLetter) -> Option<String> {
        volume_information(letter).map(|info| info.label)
    }

    async fn drive_type(&self, letter: DriveLetter) -> Option<OsDriveType> {
        let root = root_wide(letter);
        let code = unsafe { GetDriveTypeW(root.as_ptr()) };
        Some(OsDriveType::from_code(code))
    }

    async fn volume_serial(&self, letter: DriveLetter) -> Option<u32> {
        volume_information(letter).map(|info| info.serial)
    }

    async fn disk_space(&self, letter: DriveLetter) -> Option<DiskSpace> {
        disk_free_space(&letter.root())
    }

    async fn process_running(&self, image_name: &str) -> Option<bool> {
        let filter = format!("IMAGENAME eq {image_name}");
        let output = run_captured("tasklist", &["/FI", &filter, "/NH"], TOOL_TIMEOUT)
            .await
            .found()?;
        Some(
            output
                .to_lowercase()
                .contains(&image_name.to_lowercase()),
        )
    }

    async fn service_status(&self, service: &str) -> Option<String> {
        run_captured("sc", &["query", service], TOOL_TIMEOUT)
            .await
            .found()
    }

    async fn logical_disks(&self) -> Option<Vec<LogicalDisk>> {
        let output = run_captured(
            "wmic",
            &[
                "logicaldisk",
                "get",
                "Name,Description,DriveType,Size,FreeSpace",
                "/format:csv",
            ],
            TOOL_TIMEOUT,
        )
        .await
        .found()?;
        Some(parse_logical_disks(&output))
    }

    async fn storage_device_names(&self) -> Option<Vec<String>> {
        let output = run_captured(
            "powershell",
            &[
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "Get-PnpDevice -PresentOnly -Class DiskDrive,Volume | \
                 Select-Object -ExpandProperty FriendlyName",
            ],
            TOOL_TIMEOUT,
        )
        .await
        .found()?;
        Some(
            output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    async fn exists(&self, letter: DriveLetter) -> bool {
        letter.root().exists()
    }
}
