use crate::constants::{APP_DIR_NAME, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::error::{Result, SlimmingError};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings shared by the store and the HTTP client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cached key and usage history.
    pub storage_dir: PathBuf,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Config {
    /// Builds a configuration, filling unset values with defaults.
    ///
    /// # Arguments
    /// * `storage_dir` - Override for the storage directory
    /// * `endpoint` - Override for the compression service base URL
    /// * `timeout_secs` - Override for the per-request timeout
    ///
    /// # Returns
    /// * `Err(SlimmingError::Config)` if no storage directory can be determined
    ///   or an override is malformed
    pub fn new(
        storage_dir: Option<PathBuf>,
        endpoint: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let storage_dir = match storage_dir {
            Some(dir) => dir,
            None => default_storage_dir()?,
        };

        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(SlimmingError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        let timeout = match timeout_secs {
            Some(0) => {
                return Err(SlimmingError::Config(
                    "timeout must be at least one second".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            storage_dir,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

fn default_storage_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            SlimmingError::Config("cannot determine a storage directory, use --storage-dir".into())
        })
}
