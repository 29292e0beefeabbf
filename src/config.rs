use crate::pipeline::REPLIED_MEMORY;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SETTINGS_FILE: &str = "settings.toml";

/// Longest allowed pause between passes: one day.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub label_name: String,
    pub reply_body: String,
    pub query: String,
    pub max_results: u32,
    pub max_pages: u32,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    /// Remove UNREAD from a thread once it has been answered.
    pub mark_read: bool,
    /// How many answered thread ids to remember across passes.
    pub replied_memory: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            label_name: "testing".to_string(),
            reply_body: "Your automatic reply message here.".to_string(),
            query: "is:unread -in:sent -in:chat".to_string(),
            max_results: 100,
            max_pages: 1,
            min_interval_secs: 45,
            max_interval_secs: 120,
            mark_read: true,
            replied_memory: REPLIED_MEMORY,
        }
    }
}

impl Config {
    /// Reads `settings.toml` from the working directory, falling back to defaults.
    pub fn load() -> Self {
        let path = Path::new(SETTINGS_FILE);
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Ignoring settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.label_name.trim().is_empty() {
            bail!("label_name must not be empty");
        }
        if self.min_interval_secs > self.max_interval_secs {
            bail!(
                "min_interval_secs ({}) exceeds max_interval_secs ({})",
                self.min_interval_secs,
                self.max_interval_secs
            );
        }
        if self.max_interval_secs > MAX_INTERVAL_SECS {
            bail!(
                "max_interval_secs ({}) exceeds the limit of {}",
                self.max_interval_secs,
                MAX_INTERVAL_SECS
            );
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if self.max_results == 0 {
            bail!("max_results must be at least 1");
        }
        Ok(())
    }
}
