//! Mapping-table acquisition backends.
//!
//! Implements [`TableSource`] for the remote HTTPS download, the local
//! SPIFFS file, and the download-then-file fallback chain.  Every backend
//! funnels its body through [`read_bounded`], which refuses to hand a cut
//! off body to the parser.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: HTTPS via `esp_idf_svc::http::client` with
//!   the built-in certificate bundle.
//! - **all other targets**: the HTTP backend reports a transport failure;
//!   the file backend works everywhere.

use std::io::{ErrorKind, Read};

use log::{info, warn};

use crate::app::ports::TableSource;
use crate::config::{DispatchConfig, TableSourceKind};
use crate::error::AcquisitionError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::{
    Method,
    client::{Configuration as HttpConfiguration, EspHttpConnection},
};

/// Read chunk size for streamed bodies.
const CHUNK: usize = 512;

impl<T: TableSource + ?Sized> TableSource for Box<T> {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        (**self).acquire()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ───────────────────────────────────────────────────────────────
// Bounded body reader
// ───────────────────────────────────────────────────────────────

fn classify_io(e: &std::io::Error) -> AcquisitionError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => AcquisitionError::Timeout,
        ErrorKind::NotFound => AcquisitionError::NotFound,
        _ => AcquisitionError::TransportFailure,
    }
}

/// Read a whole body of at most `max - 1` bytes.
///
/// A body that reaches `max` bytes, or ends before its declared length,
/// is [`AcquisitionError::Truncated`].  A zero-length body is
/// [`AcquisitionError::Empty`].
pub fn read_bounded(
    body: &mut impl Read,
    declared: Option<usize>,
    max: usize,
) -> Result<Vec<u8>, AcquisitionError> {
    if let Some(len) = declared {
        if len >= max {
            warn!("Table body declares {} bytes, limit is {}", len, max);
            return Err(AcquisitionError::Truncated { read: 0, declared });
        }
    }

    let mut buf = Vec::with_capacity(declared.unwrap_or(CHUNK).min(max));
    let mut chunk = [0u8; CHUNK];
    loop {
        let room = max - buf.len();
        if room == 0 {
            warn!("Table body reached the {} byte limit", max);
            return Err(AcquisitionError::Truncated {
                read: buf.len(),
                declared,
            });
        }
        let n = match body.read(&mut chunk[..room.min(CHUNK)]) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Table body read failed: {}", e);
                return Err(classify_io(&e));
            }
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    if let Some(len) = declared {
        if buf.len() < len {
            return Err(AcquisitionError::Truncated {
                read: buf.len(),
                declared,
            });
        }
    }
    if buf.is_empty() {
        return Err(AcquisitionError::Empty);
    }
    Ok(buf)
}

// ───────────────────────────────────────────────────────────────
// Local file
// ───────────────────────────────────────────────────────────────

/// Reads the table from a fixed path (SPIFFS on the device).
pub struct FileTableSource {
    path: String,
    max_bytes: usize,
}

impl FileTableSource {
    pub fn new(path: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }
}

impl TableSource for FileTableSource {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        let mut file = std::fs::File::open(&self.path).map_err(|e| {
            warn!("Failed to open {}: {}", self.path, e);
            classify_io(&e)
        })?;
        let declared = file
            .metadata()
            .ok()
            .and_then(|m| usize::try_from(m.len()).ok());
        let raw = read_bounded(&mut file, declared, self.max_bytes)?;
        info!("Read {} bytes from {}", raw.len(), self.path);
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ───────────────────────────────────────────────────────────────
// Remote HTTPS
// ───────────────────────────────────────────────────────────────

/// Downloads the table with a single `GET`; only HTTP 200 is accepted.
pub struct HttpTableSource {
    url: String,
    timeout_ms: u32,
    max_bytes: usize,
}

impl HttpTableSource {
    pub fn new(url: impl Into<String>, timeout_ms: u32, max_bytes: usize) -> Self {
        Self {
            url: url.into(),
            timeout_ms,
            max_bytes,
        }
    }
}

#[cfg(target_os = "espidf")]
struct HttpBody<'a>(&'a mut EspHttpConnection);

#[cfg(target_os = "espidf")]
impl Read for HttpBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            let kind = if is_timeout(e) {
                ErrorKind::TimedOut
            } else {
                ErrorKind::Other
            };
            std::io::Error::new(kind, e)
        })
    }
}

#[cfg(target_os = "espidf")]
fn is_timeout(e: esp_idf_svc::sys::EspError) -> bool {
    use esp_idf_svc::sys::{ESP_ERR_HTTP_EAGAIN, ESP_ERR_TIMEOUT};
    let code = e.code();
    code == ESP_ERR_HTTP_EAGAIN as i32 || code == ESP_ERR_TIMEOUT as i32
}

#[cfg(target_os = "espidf")]
impl TableSource for HttpTableSource {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        let config = HttpConfiguration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.timeout_ms))),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let fail = |e: esp_idf_svc::sys::EspError| {
            warn!("GET {} failed: {}", self.url, e);
            if is_timeout(e) {
                AcquisitionError::Timeout
            } else {
                AcquisitionError::TransportFailure
            }
        };

        let mut conn = EspHttpConnection::new(&config).map_err(fail)?;
        conn.initiate_request(Method::Get, &self.url, &[])
            .map_err(fail)?;
        conn.initiate_response().map_err(fail)?;

        let status = conn.status();
        if status != 200 {
            warn!("GET {} returned HTTP {}", self.url, status);
            return Err(AcquisitionError::Status(status));
        }
        let declared = conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok());
        let raw = read_bounded(&mut HttpBody(&mut conn), declared, self.max_bytes)?;
        info!("Downloaded {} bytes from {}", raw.len(), self.url);
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "https"
    }
}

#[cfg(not(target_os = "espidf"))]
impl TableSource for HttpTableSource {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        warn!(
            "HTTP(sim): no network stack, cannot fetch {} ({} ms, {} bytes max)",
            self.url, self.timeout_ms, self.max_bytes
        );
        Err(AcquisitionError::TransportFailure)
    }

    fn name(&self) -> &'static str {
        "https"
    }
}

// ───────────────────────────────────────────────────────────────
// Fallback chain
// ───────────────────────────────────────────────────────────────

/// Tries `primary`, then `fallback`.  The fallback's error wins when both
/// fail.
pub struct FallbackTableSource<P, F> {
    primary: P,
    fallback: F,
    served_by: &'static str,
}

impl<P: TableSource, F: TableSource> FallbackTableSource<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        let served_by = primary.name();
        Self {
            primary,
            fallback,
            served_by,
        }
    }
}

impl<P: TableSource, F: TableSource> TableSource for FallbackTableSource<P, F> {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        match self.primary.acquire() {
            Ok(raw) => {
                self.served_by = self.primary.name();
                Ok(raw)
            }
            Err(e) => {
                warn!(
                    "{} source failed ({}), trying {}",
                    self.primary.name(),
                    e,
                    self.fallback.name()
                );
                let raw = self.fallback.acquire()?;
                self.served_by = self.fallback.name();
                Ok(raw)
            }
        }
    }

    /// Name of the backend that served the last successful acquisition.
    fn name(&self) -> &'static str {
        self.served_by
    }
}

/// Build the backend chain selected by `config.table_source`.
pub fn from_config(config: &DispatchConfig) -> Box<dyn TableSource + Send> {
    let remote = || {
        HttpTableSource::new(
            config.table_url.clone(),
            config.table_timeout_ms,
            config.max_table_bytes,
        )
    };
    let local = || FileTableSource::new(config.table_path.clone(), config.max_table_bytes);
    match config.table_source {
        TableSourceKind::Remote => Box::new(remote()),
        TableSourceKind::Local => Box::new(local()),
        TableSourceKind::RemoteWithLocalFallback => {
            Box::new(FallbackTableSource::new(remote(), local()))
        }
    }
}
