//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the deployment configuration lives in one
//! `postcard` blob under the `sonotify` namespace.  Every value is
//! validated before it is persisted and again after it is loaded.
//!
//! The simulation backend keeps the blob in memory (dev/test only).

use core::cell::RefCell;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::DispatchConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "sonotify";
const CONFIG_KEY: &str = "dispcfg";

/// Largest blob accepted back from flash.
const MAX_BLOB_SIZE: usize = 2048;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    nvs: RefCell<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    blob: RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Open the config namespace on the default partition.
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NvsAdapter: cannot open '{}': {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: ESP-IDF NVS namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self {
            nvs: RefCell::new(nvs),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            blob: RefCell::new(None),
        })
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        let nvs = self.nvs.borrow();
        match nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(found) => Ok(found.map(<[u8]>::to_vec)),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.borrow().clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.nvs
            .borrow_mut()
            .set_blob(CONFIG_KEY, bytes)
            .map_err(|e| {
                warn!("NvsAdapter: NVS write error {}", e);
                ConfigError::IoError
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}

fn validate(config: &DispatchConfig) -> Result<(), ConfigError> {
    config
        .validate()
        .map_err(|e| ConfigError::ValidationFailed(e.0))
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DispatchConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(DispatchConfig::default());
        };
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::Corrupted);
        }
        let config: DispatchConfig =
            postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate(&config)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(config)
    }

    fn save(&self, config: &DispatchConfig) -> Result<(), ConfigError> {
        validate(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
