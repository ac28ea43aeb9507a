//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] by storing [`FlagConfig`] as one postcard
//! blob under `buildflag::config`.
//!
//! - Config validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The host backend keeps the blob in memory (dev/test only).
//!
//! Calibration results are never stored; the flag re-homes on every boot.

use log::info;

use crate::app::ports::ConfigPort;
use crate::config::FlagConfig;
use crate::error::ConfigError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &str = "buildflag";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &str = "config";

/// Upper bound for the encoded blob.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    #[cfg(target_os = "espidf")]
    nvs: EspNvs<NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

#[cfg(target_os = "espidf")]
impl NvsConfigStore {
    /// Open the config namespace read-write on the default partition.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            log::error!("NVS: cannot open '{}': {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self { nvs })
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsConfigStore {
    pub fn new() -> Self {
        info!("NvsConfigStore: in-memory backend");
        Self { blob: None }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for NvsConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(config: &FlagConfig) -> Result<Vec<u8>, ConfigError> {
    config.validate()?;
    let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::ValidationFailed("encoded config too large"));
    }
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> Result<FlagConfig, ConfigError> {
    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<FlagConfig, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            let mut buf = [0u8; MAX_BLOB_SIZE];
            match self.nvs.get_raw(CONFIG_KEY, &mut buf) {
                Ok(Some(bytes)) => decode(bytes),
                Ok(None) => Err(ConfigError::NotFound),
                Err(e) => {
                    log::warn!("NVS: read failed: {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.blob.as_deref().map_or(Err(ConfigError::NotFound), decode)
        }
    }

    fn save(&mut self, config: &FlagConfig) -> Result<(), ConfigError> {
        let bytes = encode(config)?;

        #[cfg(target_os = "espidf")]
        self.nvs.set_raw(CONFIG_KEY, &bytes).map_err(|e| {
            log::warn!("NVS: write failed: {}", e);
            ConfigError::IoError
        })?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.blob = Some(bytes);
        }

        info!("NvsConfigStore: config saved");
        Ok(())
    }
}
