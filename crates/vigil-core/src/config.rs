//! Application configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.
//! Priority for the file location: VIGIL_CONFIG env var > `<config dir>/config.toml`.
//! A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::SecretVault;
use crate::client::DEFAULT_TIMEOUT_SECS;
use crate::db;
use crate::error::{Error, Result};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api";

/// Background sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub enabled: bool,
    /// Sync interval in minutes
    pub interval_minutes: u32,
    /// Run a sync as soon as connectivity comes back
    pub sync_on_reconnect: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 15,
            sync_on_reconnect: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the auth backend (`/register` and `/login` live under it)
    pub server_url: String,
    /// HTTP timeout for backend calls
    pub timeout_secs: u64,
    /// How often the reachability probe runs
    pub probe_interval_secs: u64,
    /// Database file; `~` is expanded
    pub db_path: Option<String>,
    /// Key file for sealed secrets; `~` is expanded
    pub key_path: Option<String>,
    /// Base64 sealing key; takes precedence over `key_path`
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub bcrypt_cost: u32,
    pub sync: SyncSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            probe_interval_secs: 30,
            db_path: None,
            key_path: None,
            secret_key: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            sync: SyncSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        log::info!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Apply `VIGIL_*` overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VIGIL_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(path) = lookup("VIGIL_DB_PATH") {
            self.db_path = Some(path);
        }
        if let Some(key) = lookup("VIGIL_SECRET_KEY") {
            self.secret_key = Some(key);
        }
        if let Some(minutes) = lookup("VIGIL_SYNC_INTERVAL_MINUTES").and_then(|v| v.parse().ok()) {
            self.sync.interval_minutes = minutes;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::config("server_url must not be empty"));
        }
        if self.sync.interval_minutes == 0 {
            return Err(Error::config("sync.interval_minutes must be at least 1"));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(Error::config("bcrypt_cost must be between 4 and 31"));
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(expand(path)),
            None => db::get_db_path(),
        }
    }

    pub fn resolved_key_path(&self) -> Result<PathBuf> {
        match &self.key_path {
            Some(path) => Ok(expand(path)),
            None => Ok(db::data_dir()?.join("vigil.key")),
        }
    }

    /// Build the sealing vault from `secret_key` or the key file
    pub fn vault(&self) -> Result<SecretVault> {
        match &self.secret_key {
            Some(key) => SecretVault::from_base64(key),
            None => SecretVault::load_or_create(&self.resolved_key_path()?),
        }
    }
}

/// Get config file path
/// Priority: VIGIL_CONFIG env var > default config directory
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("VIGIL_CONFIG") {
        return Ok(expand(&path));
    }

    let dirs = directories::ProjectDirs::from("com", "vigil", "Vigil")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.config_dir().join("config.toml"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.sync.interval_minutes, 15);
        assert!(config.sync.enabled);
        assert!(config.sync.sync_on_reconnect);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            server_url = "https://evidence.example.org/api"

            [sync]
            interval_minutes = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url, "https://evidence.example.org/api");
        assert_eq!(config.sync.interval_minutes, 30);
        assert!(config.sync.enabled);
        assert_eq!(config.probe_interval_secs, 30);
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml_str("server_url = [");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VIGIL_SERVER_URL", "https://override.example/api"),
            ("VIGIL_DB_PATH", "/tmp/override.db"),
            ("VIGIL_SYNC_INTERVAL_MINUTES", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server_url, "https://override.example/api");
        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/override.db"));
        assert_eq!(config.sync.interval_minutes, 5);
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.sync.interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_is_not_written_back() {
        let mut config = AppConfig::default();
        config.secret_key = Some("c2VjcmV0".to_string());
        let toml = config.to_toml_string().unwrap();
        assert!(!toml.contains("secret_key"));
        assert!(toml.contains("[sync]"));
    }

    #[test]
    fn test_vault_from_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            key_path: Some(dir.path().join("vigil.key").display().to_string()),
            ..AppConfig::default()
        };

        let sealed = config.vault().unwrap().seal("pw1").unwrap();
        assert_eq!(config.vault().unwrap().open(&sealed).unwrap(), "pw1");
    }
}
