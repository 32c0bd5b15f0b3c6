//! Configuration management with secure storage
//!
//! Handles:
//! - Router address, login credentials and timeouts
//! - InfluxDB destination (url, token, org, bucket)
//! - Poll interval for the long-running mode
//! - Environment overrides and OS keyring for the router password

use crate::error::{AgentError, AgentResult};
use anyhow::Result;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KEYRING_SERVICE: &str = "docsis-agent";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "DOCSIS_AGENT_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub router: RouterConfig,
    pub influx: InfluxConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Read the password from the OS keyring when none is configured
    pub password_from_keyring: bool,
    pub login_timeout_secs: u64,
    pub data_timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://fritz.box".to_string(),
            username: String::new(),
            password: String::new(),
            password_from_keyring: false,
            login_timeout_secs: 10,
            data_timeout_secs: 15,
            accept_invalid_certs: true,
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: "fritzbox_docsis".to_string(),
            measurement: crate::metrics::DEFAULT_MEASUREMENT.to_string(),
            timeout_secs: 20,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl AgentConfig {
    /// Resolve the config file: explicit path, then `DOCSIS_AGENT_CONFIG`,
    /// then the OS config directory.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        Self::config_file_path()
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("docsis-agent");
        path.push("config.toml");
        Ok(path)
    }

    /// Load the file (defaults when missing), then apply environment
    /// overrides and the keyring password.
    pub async fn load(path: &Path) -> AgentResult<Self> {
        let mut config = Self::from_file_with_env(path, |key| std::env::var(key).ok()).await?;

        if config.router.password.is_empty() && config.router.password_from_keyring {
            match Self::load_password(&config.router.username) {
                Ok(password) => config.router.password = password,
                Err(e) => {
                    return Err(AgentError::config(format!(
                        "router password not found in keyring: {e}"
                    )))
                }
            }
        }

        Ok(config)
    }

    pub async fn from_file(path: &Path) -> AgentResult<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::config(format!("could not read {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            AgentError::config(format!("invalid config {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the file and apply environment overrides, without the keyring.
    pub async fn from_file_with_env<F>(path: &Path, lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_file(path).await?;
        config.apply_env(lookup);
        Ok(config)
    }

    /// Override settings from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 7] = [
            ("FRITZ_URL", &mut self.router.base_url),
            ("FRITZ_USERNAME", &mut self.router.username),
            ("FRITZ_PASSWORD", &mut self.router.password),
            ("INFLUX_URL", &mut self.influx.url),
            ("INFLUX_TOKEN", &mut self.influx.token),
            ("INFLUX_ORG", &mut self.influx.org),
            ("INFLUX_BUCKET", &mut self.influx.bucket),
        ];
        for (key, target) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!("Config override from {}", key);
                *target = value;
            }
        }
    }

    /// Reject blank required settings before any network traffic.
    pub fn validate(&self) -> AgentResult<()> {
        let required = [
            ("router.base_url", &self.router.base_url),
            ("router.username", &self.router.username),
            ("router.password", &self.router.password),
            ("influx.url", &self.influx.url),
            ("influx.token", &self.influx.token),
            ("influx.org", &self.influx.org),
            ("influx.bucket", &self.influx.bucket),
            ("influx.measurement", &self.influx.measurement),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(AgentError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Save config to the given location, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut stored = self.clone();
        if stored.router.password_from_keyring {
            stored.router.password.clear();
        }
        let content = toml::to_string_pretty(&stored)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Load password from secure OS keyring
    fn load_password(username: &str) -> Result<String> {
        let entry = Entry::new(KEYRING_SERVICE, username)?;
        entry.get_password().map_err(Into::into)
    }

    /// Save password to secure OS keyring
    pub fn save_password(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(KEYRING_SERVICE, username)?;
        entry.set_password(password).map_err(Into::into)
    }
}
