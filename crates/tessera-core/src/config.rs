//! Configuration management for Tessera.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/tessera/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used. The value is built once
/// at startup and handed by reference to the runtime and the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Request and scoring settings
    pub probing: ProbingConfig,
    /// Worker pool settings
    pub workers: WorkerConfig,
    /// Proxy cooldown settings
    pub proxies: ProxyConfig,
    /// Descriptor discovery settings
    pub descriptors: DescriptorConfig,
    /// Candidate generation limits
    pub candidates: CandidateConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TESSERA_THREADS`: Override worker thread count
    /// - `TESSERA_DELAY_SECS`: Override the inter-request delay
    /// - `TESSERA_REQUEST_TIMEOUT_SECS`: Override the default request timeout
    /// - `TESSERA_DESCRIPTOR_DIRS`: Extra descriptor directories (path-separated)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("TESSERA_THREADS") {
            if let Ok(threads) = val.parse() {
                self.workers.threads = threads;
                tracing::debug!("Override workers.threads from env: {}", threads);
            }
        }

        if let Ok(val) = std::env::var("TESSERA_DELAY_SECS") {
            if let Ok(delay) = val.parse() {
                self.probing.delay_secs = delay;
                tracing::debug!("Override probing.delay_secs from env: {}", delay);
            }
        }

        if let Ok(val) = std::env::var("TESSERA_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = val.parse() {
                self.probing.request_timeout_secs = timeout;
                tracing::debug!("Override probing.request_timeout_secs from env: {}", timeout);
            }
        }

        if let Some(val) = std::env::var_os("TESSERA_DESCRIPTOR_DIRS") {
            for dir in std::env::split_paths(&val) {
                if !dir.as_os_str().is_empty() && !self.descriptors.extra_dirs.contains(&dir) {
                    tracing::debug!("Adding descriptor dir from env: {}", dir.display());
                    self.descriptors.extra_dirs.push(dir);
                }
            }
        }
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.probing.confirmation_threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "probing.confirmation_threshold".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.proxies.error_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "proxies.error_threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.candidates.max_wildcards == 0 {
            return Err(ConfigError::InvalidValue {
                field: "candidates.max_wildcards".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tessera/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "tessera", "tessera").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the default descriptor directory.
    ///
    /// Uses XDG base directories: `~/.local/share/tessera/descriptors`
    pub fn descriptor_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "tessera", "tessera").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().join("descriptors"))
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,tessera=debug".to_string(),
        }
    }
}

/// Request and scoring settings shared by every descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    /// Request timeout in seconds when a descriptor sets none
    pub request_timeout_secs: u64,
    /// Delay between checks in seconds (per worker)
    pub delay_secs: u64,
    /// Confidence score at which a check is confirmed as found
    pub confirmation_threshold: f64,
    /// User agent sent with every request unless a descriptor overrides it
    pub user_agent: String,
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            delay_secs: 2,
            confirmation_threshold: 100.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct WorkerConfig {
    /// Number of worker threads (0 = sequential, in the calling thread)
    pub threads: usize,
    /// Attempts made while waiting for a proxy before failing the item
    pub proxy_wait_attempts: u32,
    /// Pause between proxy wait attempts in milliseconds
    pub proxy_wait_interval_ms: u64,
    /// How often the coordinator polls workers and reports progress
    pub monitor_interval_ms: u64,
    /// Bounded wait for each worker on shutdown
    pub join_timeout_secs: u64,
    /// Ask the operator before continuing after a positive result
    pub pause_on_found: bool,
    /// Start with pause prompts disabled
    pub auto_continue: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            proxy_wait_attempts: 30,
            proxy_wait_interval_ms: 1000,
            monitor_interval_ms: 500,
            join_timeout_secs: 5,
            pause_on_found: true,
            auto_continue: false,
        }
    }
}

/// Proxy cooldown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Cooldown applied when a proxy is rate limited
    pub rate_limit_cooldown_secs: u64,
    /// Cooldown applied once a proxy reaches the error threshold
    pub error_cooldown_secs: u64,
    /// Number of errors before a proxy is cooled down
    pub error_threshold: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown_secs: 600,
            error_cooldown_secs: 300,
            error_threshold: 3,
        }
    }
}

/// Descriptor discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Directories searched in addition to the default descriptor directory
    pub extra_dirs: Vec<PathBuf>,
}

/// Candidate generation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Maximum wildcards accepted in a pattern
    pub max_wildcards: usize,
    /// Maximum number of work items in one run
    pub max_variations: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            max_wildcards: 6,
            max_variations: 1_000_000,
        }
    }
}
