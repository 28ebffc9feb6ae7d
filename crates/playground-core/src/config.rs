//! Configuration for the caching gateway.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PLAYGROUND_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/playground/gateway.toml
//!   3. ~/.config/playground/gateway.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen: ListenConfig,
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind address.
    pub address: String,
    /// TCP port. 0 = OS-assigned.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the compile backend, without a trailing slash.
    pub url: String,
    /// Per-request timeout. Builds are slow; keep this generous.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub store: StoreKind,
    /// Root directory for the filesystem store.
    pub path: PathBuf,
    /// Also cache non-2xx backend responses.
    pub cache_failures: bool,
    /// Requests presenting this value in `cache-bypass` skip the lookup.
    /// Empty = bypass disabled.
    pub bypass_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request body the gateway will read.
    pub max_body_bytes: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:53740".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Filesystem,
            path: data_dir().join("cache"),
            cache_failures: true,
            bypass_token: String::new(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
        }
    }
}

impl CacheConfig {
    pub fn bypass_token(&self) -> Option<&str> {
        Some(self.bypass_token.as_str()).filter(|t| !t.is_empty())
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("playground")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("playground")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a config file, or defaults when it does not exist.
    pub fn load_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(GatewayConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PLAYGROUND_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("gateway.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &std::path::Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&GatewayConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply PLAYGROUND_* overrides read through `var`.
    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("PLAYGROUND_LISTEN__ADDRESS") {
            self.listen.address = v;
        }
        if let Some(p) = var("PLAYGROUND_LISTEN__PORT").and_then(|v| v.parse().ok()) {
            self.listen.port = p;
        }
        if let Some(v) = var("PLAYGROUND_BACKEND__URL") {
            self.backend.url = v.trim_end_matches('/').to_string();
        }
        if let Some(t) = var("PLAYGROUND_BACKEND__TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.backend.timeout_secs = t;
        }
        match var("PLAYGROUND_CACHE__STORE").as_deref() {
            Some("memory") => self.cache.store = StoreKind::Memory,
            Some("filesystem") => self.cache.store = StoreKind::Filesystem,
            _ => {}
        }
        if let Some(v) = var("PLAYGROUND_CACHE__PATH") {
            self.cache.path = PathBuf::from(v);
        }
        if let Some(v) = var("PLAYGROUND_CACHE__CACHE_FAILURES") {
            self.cache.cache_failures = v == "true" || v == "1";
        }
        if let Some(v) = var("PLAYGROUND_CACHE__BYPASS_TOKEN") {
            self.cache.bypass_token = v;
        }
        if let Some(n) = var("PLAYGROUND_LIMITS__MAX_BODY_BYTES").and_then(|v| v.parse().ok()) {
            self.limits.max_body_bytes = n;
        }
    }
}
