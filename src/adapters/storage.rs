//! SPIFFS mount for the local table file.
//!
//! On the device the `spiffs` partition is registered at `/spiffs`
//! (formatted if mounting fails) so [`FileTableSource`] can read
//! `/spiffs/dispatch.json` through `std::fs`.  On the host the mount is a
//! no-op and paths refer to the local filesystem.
//!
//! [`FileTableSource`]: super::table_source::FileTableSource

use core::fmt;

use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    ESP_ERR_NOT_FOUND, ESP_FAIL, EspError, esp, esp_spiffs_info, esp_vfs_spiffs_conf_t,
    esp_vfs_spiffs_register,
};

pub const MOUNT_POINT: &str = "/spiffs";
pub const PARTITION_LABEL: &str = "spiffs";
const MAX_OPEN_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Could not mount or format the filesystem.
    MountFailed,
    /// No partition with the expected label.
    PartitionNotFound,
    /// Driver returned an unexpected error code.
    Driver(i32),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MountFailed => write!(f, "failed to mount or format filesystem"),
            Self::PartitionNotFound => write!(f, "SPIFFS partition '{}' not found", PARTITION_LABEL),
            Self::Driver(code) => write!(f, "SPIFFS driver error {}", code),
        }
    }
}

impl std::error::Error for StorageError {}

/// Space usage reported after mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub total_bytes: usize,
    pub used_bytes: usize,
}

/// Register the SPIFFS partition at [`MOUNT_POINT`].
#[cfg(target_os = "espidf")]
pub fn mount_spiffs() -> Result<StorageUsage, StorageError> {
    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: c"spiffs".as_ptr(),
        max_files: MAX_OPEN_FILES,
        format_if_mount_failed: true,
    };

    // SAFETY: `conf` points at 'static C strings and is only read during
    // registration, which happens once from the main task.
    esp!(unsafe { esp_vfs_spiffs_register(&conf) }).map_err(|e: EspError| {
        warn!("SPIFFS: register failed ({})", e);
        match e.code() {
            c if c == ESP_FAIL as i32 => StorageError::MountFailed,
            c if c == ESP_ERR_NOT_FOUND as i32 => StorageError::PartitionNotFound,
            c => StorageError::Driver(c),
        }
    })?;

    let mut total: usize = 0;
    let mut used: usize = 0;
    // SAFETY: the label is a valid C string; out-pointers are live locals.
    esp!(unsafe { esp_spiffs_info(c"spiffs".as_ptr(), &mut total, &mut used) }).map_err(
        |e: EspError| {
            warn!("SPIFFS: info failed ({})", e);
            StorageError::Driver(e.code())
        },
    )?;
    info!("SPIFFS: mounted at {} ({} / {} bytes used)", MOUNT_POINT, used, total);
    Ok(StorageUsage {
        total_bytes: total,
        used_bytes: used,
    })
}

#[cfg(not(target_os = "espidf"))]
pub fn mount_spiffs() -> Result<StorageUsage, StorageError> {
    info!(
        "SPIFFS(sim): '{}' at {} not mounted, using host filesystem (max {} files)",
        PARTITION_LABEL, MOUNT_POINT, MAX_OPEN_FILES
    );
    Ok(StorageUsage {
        total_bytes: 0,
        used_bytes: 0,
    })
}
