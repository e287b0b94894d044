use serde::Deserialize;

use crate::{StorageError, StorageResult};

/// Environment variable overriding [`StorageConfig::upload_base_url`]
pub const ENV_UPLOAD_BASE_URL: &str = "DOG_STORAGE_UPLOAD_BASE_URL";

/// Environment variable overriding [`StorageConfig::max_blob_bytes`]
pub const ENV_MAX_BLOB_BYTES: &str = "DOG_STORAGE_MAX_BLOB_BYTES";

/// Configuration for an emulated storage client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Scheme and host prepended to every resumable upload url
    pub upload_base_url: String,

    /// Absolute max size a single upload session may stage
    pub max_blob_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_base_url: "https://www.googleapis.com".to_string(),
            max_blob_bytes: 5 * 1024 * 1024 * 1024, // 5GB
        }
    }
}

impl StorageConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DOG_STORAGE_*` environment variables
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_UPLOAD_BASE_URL) {
            config.upload_base_url = base;
        }
        if let Some(max) = lookup(ENV_MAX_BLOB_BYTES) {
            config.max_blob_bytes = max.trim().parse().map_err(|_| {
                StorageError::invalid_config(format!("{ENV_MAX_BLOB_BYTES} is not a byte count: {max}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the upload base url
    pub fn with_upload_base_url<S: Into<String>>(mut self, base: S) -> Self {
        self.upload_base_url = base.into();
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        if !(self.upload_base_url.starts_with("http://") || self.upload_base_url.starts_with("https://")) {
            return Err(StorageError::invalid_config(format!(
                "upload base url must be http(s): {}",
                self.upload_base_url
            )));
        }
        if self.max_blob_bytes == 0 {
            return Err(StorageError::invalid_config("max_blob_bytes must be positive"));
        }
        Ok(())
    }
}
