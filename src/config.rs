//! Deployment configuration
//!
//! All tunable parameters for one dispatcher deployment.
//! Defaults can be overridden at build time through `SONOTIFY_*`
//! environment variables or at runtime via the NVS config blob.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::dispatch::tag::TagFormat;

/// How a scanned tag selects a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Match the scanned identifier against `tagId` (reader attached).
    Matched,
    /// No reader: dispatch the first row once at startup.
    Positional,
}

/// Where the mapping table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSourceKind {
    /// HTTPS download from `table_url`.
    Remote,
    /// File at `table_path` on SPIFFS.
    Local,
    /// Download first, fall back to the local file.
    RemoteWithLocalFallback,
}

/// Core deployment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    // --- Network ---
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Station reconnect attempts after the first failure.
    pub wifi_max_retries: u32,

    // --- Mapping table ---
    pub mode: DispatchMode,
    pub table_source: TableSourceKind,
    pub table_url: String,
    pub table_path: String,
    /// Download bound; bodies reaching it are rejected as truncated.
    pub max_table_bytes: usize,
    pub table_timeout_ms: u32,
    /// Total acquisition attempts before the session gives up.
    pub table_max_attempts: u32,
    pub table_retry_delay_ms: u32,
    /// Periodic re-download interval (0 = never).
    pub table_refresh_secs: u32,

    // --- Notification ---
    pub webhook_url: String,
    /// Media player entity that receives every dispatch.
    pub target_device: String,
    pub notify_timeout_ms: u32,

    // --- Reader ---
    pub tag_format: TagFormat,
    /// Consecutive empty polls before a tag counts as removed.
    pub reader_release_polls: u32,

    // --- Timing ---
    /// Session tick / queue poll interval (milliseconds)
    pub poll_interval_ms: u32,
}

const DEFAULT_TABLE_URL: &str =
    "https://raw.githubusercontent.com/andrefs/sonotify-nfc-esp32/main/dispatch.json";
const DEFAULT_WEBHOOK_URL: &str = "http://homeassistant.local:8123/api/webhook/sonotify";
const DEFAULT_TARGET_DEVICE: &str = "media_player.roam_2";

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            // Network
            wifi_ssid: option_env!("SONOTIFY_WIFI_SSID").unwrap_or("").into(),
            wifi_password: option_env!("SONOTIFY_WIFI_PASSWORD").unwrap_or("").into(),
            wifi_max_retries: 5,

            // Mapping table
            mode: DispatchMode::Matched,
            table_source: TableSourceKind::RemoteWithLocalFallback,
            table_url: option_env!("SONOTIFY_TABLE_URL")
                .unwrap_or(DEFAULT_TABLE_URL)
                .into(),
            table_path: "/spiffs/dispatch.json".into(),
            max_table_bytes: 4096,
            table_timeout_ms: 10_000,
            table_max_attempts: 3,
            table_retry_delay_ms: 2_000,
            table_refresh_secs: 0,

            // Notification
            webhook_url: option_env!("SONOTIFY_WEBHOOK_URL")
                .unwrap_or(DEFAULT_WEBHOOK_URL)
                .into(),
            target_device: option_env!("SONOTIFY_TARGET_DEVICE")
                .unwrap_or(DEFAULT_TARGET_DEVICE)
                .into(),
            notify_timeout_ms: 10_000,

            // Reader
            tag_format: TagFormat::Plain,
            reader_release_polls: 5,

            // Timing
            poll_interval_ms: 100, // 10 Hz
        }
    }
}

/// A config field failed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidConfig(pub &'static str);

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl DispatchConfig {
    /// Reject out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.wifi_ssid.len() > 32 {
            return Err(InvalidConfig("wifi_ssid must be at most 32 bytes"));
        }
        if self.wifi_max_retries > 20 {
            return Err(InvalidConfig("wifi_max_retries must be 0–20"));
        }
        let needs_remote = self.table_source != TableSourceKind::Local;
        if needs_remote && !is_http_url(&self.table_url) {
            return Err(InvalidConfig("table_url must be an http(s) URL"));
        }
        let needs_local = self.table_source != TableSourceKind::Remote;
        if needs_local && !self.table_path.starts_with('/') {
            return Err(InvalidConfig("table_path must be absolute"));
        }
        if !(64..=65_536).contains(&self.max_table_bytes) {
            return Err(InvalidConfig("max_table_bytes must be 64–65536"));
        }
        if !(500..=60_000).contains(&self.table_timeout_ms) {
            return Err(InvalidConfig("table_timeout_ms must be 500–60000"));
        }
        if !(1..=10).contains(&self.table_max_attempts) {
            return Err(InvalidConfig("table_max_attempts must be 1–10"));
        }
        if self.table_retry_delay_ms > 60_000 {
            return Err(InvalidConfig("table_retry_delay_ms must be at most 60000"));
        }
        if !is_http_url(&self.webhook_url) {
            return Err(InvalidConfig("webhook_url must be an http(s) URL"));
        }
        if self.target_device.is_empty() || !self.target_device.contains('.') {
            return Err(InvalidConfig("target_device must be a '<domain>.<name>' entity id"));
        }
        if !(500..=60_000).contains(&self.notify_timeout_ms) {
            return Err(InvalidConfig("notify_timeout_ms must be 500–60000"));
        }
        if !(1..=100).contains(&self.reader_release_polls) {
            return Err(InvalidConfig("reader_release_polls must be 1–100"));
        }
        if !(10..=1_000).contains(&self.poll_interval_ms) {
            return Err(InvalidConfig("poll_interval_ms must be 10–1000"));
        }
        Ok(())
    }

    /// Notification bound expressed in session ticks (rounded up).
    pub fn notify_timeout_ticks(&self) -> u64 {
        u64::from(self.notify_timeout_ms.div_ceil(self.poll_interval_ms))
    }
}
