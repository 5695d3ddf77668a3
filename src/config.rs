//! Configuration for the proxy, ingest service and poller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration, shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP servers bind to
    pub host: String,

    /// HTTP port (`PORT`)
    pub port: u16,

    /// OpenClaw binary name or path (`OPENCLAW_CLI`)
    pub cli_binary: String,

    /// Built front-end served as static files
    pub dist_dir: PathBuf,

    /// Bearer token required by the webhook (`WEBHOOK_SECRET`).
    ///
    /// Unset means the webhook accepts unauthenticated pushes.
    pub webhook_secret: Option<String>,

    /// SQLite file backing the key-value store in edge mode
    pub kv_db_path: PathBuf,

    /// API base the poller reads from (`DASHBOARD_API_URL`)
    pub api_base: String,

    /// Seconds between poller refreshes
    pub poll_interval_secs: u64,

    /// Serve embedded sample data instead of polling (`DASHBOARD_USE_MOCK`)
    pub use_mock: bool,

    /// Where `push` sends collected data (`DASHBOARD_WEBHOOK_URL`)
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| home.join(".local/share"))
            .join("openclaw-dashboard");

        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cli_binary: "openclaw".to_string(),
            dist_dir: PathBuf::from("dist"),
            webhook_secret: None,
            kv_db_path: data_dir.join("kv.db"),
            api_base: "http://127.0.0.1:3001/api".to_string(),
            poll_interval_secs: 30,
            use_mock: false,
            webhook_url: None,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        dirs::config_dir()
            .unwrap_or_else(|| home.join(".config"))
            .join("openclaw-dashboard")
            .join("config.json")
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults, then the given file (if any), then the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        if let Some(cli) = lookup("OPENCLAW_CLI").filter(|v| !v.is_empty()) {
            self.cli_binary = cli;
        }
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.webhook_secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(api) = lookup("DASHBOARD_API_URL").filter(|v| !v.is_empty()) {
            self.api_base = api;
        }
        if let Some(mock) = lookup("DASHBOARD_USE_MOCK") {
            self.use_mock = mock == "true";
        }
        if let Some(url) = lookup("DASHBOARD_WEBHOOK_URL").filter(|v| !v.is_empty()) {
            self.webhook_url = Some(url);
        }
        Ok(())
    }

    /// Copy of this config safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.webhook_secret.is_some() {
            config.webhook_secret = Some("********".to_string());
        }
        config
    }
}
