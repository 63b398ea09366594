use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::database::{BearDatabase, CLOUDKIT_RECORDS};
use crate::listener::ListenerConfig;
use crate::token::TokenStore;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub bear: BearConfig,
    pub callback: CallbackConfig,
    pub token: TokenConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BearConfig {
    pub scheme: String,
    /// Launcher used to open scheme URLs; platform default when unset.
    pub open_command: Option<String>,
    /// Bear's CloudKit `Records.db`; defaults to its macOS container path.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CallbackConfig {
    pub host: IpAddr,
    pub port: u16,
    pub path: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenConfig {
    pub file: Option<PathBuf>,
    pub env_var: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for BearConfig {
    fn default() -> Self {
        Self {
            scheme: "bear".to_string(),
            open_command: None,
            database: None,
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 51234,
            path: "/bear-callback".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            file: None,
            env_var: "BEAR_TOKEN".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing file means defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.bear.scheme.is_empty(), "bear.scheme must not be empty");
        ensure!(
            self.callback.host.is_loopback(),
            "callback.host must be a loopback address, got {}",
            self.callback.host
        );
        ensure!(
            self.callback.path.starts_with('/'),
            "callback.path must start with '/', got {:?}",
            self.callback.path
        );
        ensure!(self.callback.timeout_ms > 0, "callback.timeout_ms must be positive");
        Ok(())
    }

    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            host: self.callback.host,
            port: self.callback.port,
            path: self.callback.path.clone(),
        }
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback.timeout_ms)
    }

    pub fn token_store(&self) -> TokenStore {
        let file = self
            .token
            .file
            .clone()
            .unwrap_or_else(|| home().join(".bear-mcp").join("token"));
        TokenStore::new(file, self.token.env_var.clone())
    }

    pub fn bear_database(&self) -> BearDatabase {
        let path = self.bear.database.clone().unwrap_or_else(|| home().join(CLOUDKIT_RECORDS));
        BearDatabase::new(path)
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
