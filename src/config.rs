//! # Configuration Management
//!
//! This module provides configuration management for the profile service.
//! Tunables are stored in Cloudflare KV storage and loaded at runtime with
//! defaults for every setting. Object storage credentials come from Worker
//! variables and secrets and have no defaults.
//!
//! ## Configuration Sources
//!
//! 1. **KV Storage**: tunables stored as JSON under the "config" key
//! 2. **Defaults**: fallback values when KV holds no configuration
//! 3. **Worker secrets**: `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`,
//!    `CLOUDINARY_API_SECRET`
//!
//! ## Configuration Options
//!
//! - `database_name`: Name of the D1 database binding holding user records
//! - `upload_folder`: Folder under which every user namespace is created
//! - `upload_timeout_ms`: Upper bound for a single object upload
//! - `max_file_size`: Maximum picture size in bytes (default: 10MB)
//! - `max_files_per_batch`: Maximum pictures accepted by one request
//!
//! ## Example
//!
//! ```rust,ignore
//! let kv = env.kv(STORAGE_CONFIG_KV_NAME)?;
//! let config = Config::load(&kv, &env).await?;
//! println!("Upload timeout: {:?}", config.settings.upload_timeout());
//! ```

use std::time::Duration;

use crate::constants::{
    API_KEY_ENV, API_SECRET_ENV, CLOUD_NAME_ENV, DEFAULT_MAX_FILES_PER_BATCH,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_UPLOAD_FOLDER, DEFAULT_UPLOAD_TIMEOUT_MS, USERS_DB_NAME,
};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use worker::kv::KvStore;
use worker::Env;

/// Credentials for the object storage account.
///
/// All three values are required. They are read once when the configuration
/// is first loaded so a misconfigured deployment fails before serving uploads.
#[derive(Clone, PartialEq)]
pub struct StorageCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl StorageCredentials {
    /// Resolves every credential through `lookup`, reporting all missing names
    /// at once.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let cloud_name = read(CLOUD_NAME_ENV);
        let api_key = read(API_KEY_ENV);
        let api_secret = read(API_SECRET_ENV);

        match (cloud_name, api_key, api_secret) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Ok(Self {
                cloud_name,
                api_key,
                api_secret,
            }),
            (cloud_name, api_key, api_secret) => {
                let missing: Vec<&str> = [
                    (CLOUD_NAME_ENV, cloud_name.is_none()),
                    (API_KEY_ENV, api_key.is_none()),
                    (API_SECRET_ENV, api_secret.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name)
                .collect();
                Err(AppError::Configuration(format!(
                    "missing object storage settings: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Reads the credentials from Worker secrets, falling back to plain vars.
    pub fn from_env(env: &Env) -> AppResult<Self> {
        Self::from_lookup(|name| {
            env.secret(name)
                .map(|secret| secret.to_string())
                .or_else(|_| env.var(name).map(|var| var.to_string()))
                .ok()
        })
    }
}

/// Tunables stored in KV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the D1 database binding used for user records.
    /// Must match the binding name in wrangler.toml.
    pub database_name: String,

    /// Folder under which `<folder>/<user id>` namespaces are created.
    pub upload_folder: String,

    /// Upper bound for a single object upload, in milliseconds.
    /// A job exceeding it fails the whole batch.
    pub upload_timeout_ms: u64,

    /// Maximum allowed picture size in bytes.
    pub max_file_size: u64,

    /// Maximum number of pictures accepted in one upload request.
    pub max_files_per_batch: usize,
}

impl Settings {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_name: USERS_DB_NAME.to_string(),
            upload_folder: DEFAULT_UPLOAD_FOLDER.to_string(),
            upload_timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files_per_batch: DEFAULT_MAX_FILES_PER_BATCH,
        }
    }
}

/// Configuration structure for the profile service.
///
/// Built once per isolate and injected into the services that need it;
/// nothing reads ambient configuration at call time.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub settings: Settings,
    pub storage: StorageCredentials,
}

impl Config {
    /// Loads tunables from KV storage with fallback to defaults, then the
    /// storage credentials from the Worker environment.
    ///
    /// # Error Handling
    ///
    /// - If KV holds no config, defaults are used
    /// - KV access errors and invalid JSON are propagated
    /// - Missing storage credentials produce `AppError::Configuration`
    pub async fn load(kv: &KvStore, env: &Env) -> AppResult<Self> {
        let stored = kv
            .get("config")
            .json::<Settings>()
            .await
            .map_err(worker::Error::from)?;
        let settings = match stored {
            Some(settings) => settings,
            None => Settings::default(),
        };
        let storage = StorageCredentials::from_env(env)?;
        Ok(Self { settings, storage })
    }
}
