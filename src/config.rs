//! Configuration management for CampusChain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "CAMPUSCHAIN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ChainError::Config(format!("unknown storage backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_chain_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_chain_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Largest payload the HTTP surface accepts for an append.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        toml::from_str(s).map_err(|e| ChainError::Config(e.to_string()))
    }

    /// Apply `CAMPUSCHAIN_*` overrides. `lookup` is normally `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ChainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("CAMPUSCHAIN_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("CAMPUSCHAIN_STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(port) = lookup("CAMPUSCHAIN_API_PORT") {
            self.api.port = port
                .parse()
                .map_err(|e| ChainError::Config(format!("CAMPUSCHAIN_API_PORT: {}", e)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.storage.backend != StorageBackend::Memory && self.storage.path.trim().is_empty() {
            return Err(ChainError::Config(
                "storage.path must be set for file-backed storage".to_string(),
            ));
        }
        if self.api.max_payload_bytes == 0 {
            return Err(ChainError::Config(
                "api.max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a config file, falling back to defaults when it is absent.
pub fn load_config_from(path: &Path) -> Result<Config, ChainError> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let mut config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        Config::from_toml_str(&config_str)?
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load `config.toml` (or the file named by `CAMPUSCHAIN_CONFIG`).
pub fn load_config() -> Result<Config, ChainError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&path))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Json
}

fn default_chain_path() -> String {
    "./data/chain.json".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}
