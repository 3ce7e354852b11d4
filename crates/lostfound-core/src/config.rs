use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::Item;
use crate::remote::fallback::sample_items;
use crate::role::RoleRules;

/// Project-local config file, relative to the working directory.
pub const PROJECT_CONFIG: &str = ".lostfound/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub roles: RoleRules,
    #[serde(default)]
    pub store: StoreConfig,
    /// Preferred output mode (`pretty`, `text`, `json`).
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            token: None,
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub use_samples: bool,
    /// Replaces the built-in samples when set.
    #[serde(default)]
    pub items: Option<Vec<Item>>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_samples: default_true(),
            items: None,
        }
    }
}

impl FallbackConfig {
    /// Dataset served when the remote catalog fails.
    #[must_use]
    pub fn dataset(&self) -> Vec<Item> {
        match &self.items {
            Some(items) => items.clone(),
            None if self.use_samples => sample_items(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory holding the local slots.
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("lostfound")))
            .unwrap_or_else(|| PathBuf::from(".lostfound/state"))
    }
}

fn read_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<toml::Table>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<Option<toml::Table>> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(None);
    };
    read_table(&config_dir.join("lostfound/config.toml"))
}

/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<Option<toml::Table>> {
    read_table(&project_root.join(PROJECT_CONFIG))
}

/// Recursively overlay `top` onto `base`; tables merge, everything else
/// is replaced.
fn merge_tables(base: &mut toml::Table, top: toml::Table) {
    for (key, value) in top {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl Config {
    /// Build a config from layers, lowest precedence first.
    ///
    /// # Errors
    ///
    /// Fails when the merged layers do not form a valid config.
    pub fn from_layers(layers: impl IntoIterator<Item = toml::Table>) -> Result<Self> {
        let mut merged = toml::Table::new();
        for layer in layers {
            merge_tables(&mut merged, layer);
        }
        toml::Value::Table(merged)
            .try_into::<Self>()
            .context("Invalid configuration")
    }

    /// Apply `LOSTFOUND_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Fails when `LOSTFOUND_TIMEOUT_MS` is not a number.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("LOSTFOUND_API_URL").filter(|v| !v.trim().is_empty()) {
            self.remote.base_url = url;
        }
        if let Some(raw) = lookup("LOSTFOUND_TIMEOUT_MS") {
            self.remote.timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("LOSTFOUND_TIMEOUT_MS must be milliseconds, got '{raw}'"))?;
        }
        if let Some(token) = lookup("LOSTFOUND_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.remote.token = Some(token);
        }
        if let Some(dir) = lookup("LOSTFOUND_STATE_DIR").filter(|v| !v.trim().is_empty()) {
            self.store.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

/// Defaults, then user config, then project config, then environment.
///
/// # Errors
///
/// Fails when a config file is unreadable or invalid, or an environment
/// override is malformed.
pub fn resolve_config(project_root: &Path) -> Result<Config> {
    let layers = [load_user_config()?, load_project_config(project_root)?];
    let mut config = Config::from_layers(layers.into_iter().flatten())?;
    config.apply_env(|key| env::var(key).ok())?;
    Ok(config)
}

const fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

const fn default_timeout_ms() -> u64 {
    8_000
}
