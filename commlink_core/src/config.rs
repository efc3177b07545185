//! Persisted server configuration.
//!
//! A single JSON document. Every field has a default, so partial or
//! older files still load; a missing or unreadable file is replaced by
//! defaults on startup.

use crate::markers::DEFAULT_MARKER_TAG;
use crate::search::Algorithm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3456;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_COMPUTE_INTERVAL_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port listeners connect to
    pub port: u16,
    
    /// Interface the listener socket binds to
    pub bind_address: String,
    
    /// Heartbeat period
    pub heartbeat_interval_ms: u64,
    
    /// Quality computation period
    pub compute_interval_ms: u64,
    
    /// Engine active at startup
    pub algorithm: Algorithm,
    
    /// Label fragment identifying diagnostic radios
    pub marker_tag: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            compute_interval_ms: DEFAULT_COMPUTE_INTERVAL_MS,
            algorithm: Algorithm::default(),
            marker_tag: DEFAULT_MARKER_TAG.to_string(),
        }
    }
}

impl ServerConfig {
    /// `bind_address:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
    
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
    
    pub fn compute_interval(&self) -> Duration {
        Duration::from_millis(self.compute_interval_ms)
    }
}

/// File-backed home of a [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
    
    pub fn path(&self) -> &Path {
        &self.path
    }
    
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
    
    pub fn save(&self, config: &ServerConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
    
    /// Loads the config, falling back to persisted defaults on any failure.
    pub fn load_or_create(&self) -> ServerConfig {
        match self.load() {
            Ok(config) => {
                info!("Loaded config from {}", self.path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config, creating default: {}", e);
                let config = ServerConfig::default();
                if let Err(e) = self.save(&config) {
                    warn!("Failed to persist default config: {}", e);
                }
                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    
    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3456);
        assert_eq!(config.listen_addr(), "127.0.0.1:3456");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.compute_interval(), Duration::from_millis(500));
        assert_eq!(config.algorithm, Algorithm::BestPath);
        assert_eq!(config.marker_tag, "[DEBUG RADIO]");
    }
    
    #[test]
    fn test_missing_file_creates_and_persists_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("commlink.json"));
        
        let config = store.load_or_create();
        assert_eq!(config, ServerConfig::default());
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), config);
    }
    
    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commlink.json");
        fs::write(&path, r#"{ "port": 4000, "algorithm": "walk_network" }"#).unwrap();
        
        let config = ConfigStore::new(&path).load_or_create();
        assert_eq!(config.port, 4000);
        assert_eq!(config.algorithm, Algorithm::WalkNetwork);
        assert_eq!(config.compute_interval_ms, 500);
    }
    
    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commlink.json");
        fs::write(&path, "{ not json").unwrap();
        let store = ConfigStore::new(&path);
        
        assert!(matches!(store.load(), Err(ConfigError::Json(_))));
        let config = store.load_or_create();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(store.load().unwrap(), config);
    }
}
