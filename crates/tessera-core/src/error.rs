//! Error types shared by the engine crates.
//!
//! Configuration failures get their own enum; everything else core can
//! reject (service keys, phone patterns) is a [`TesseraError`].

use thiserror::Error;

/// Errors raised by core types.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A value failed validation (e.g. a malformed service key)
    #[error("validation error: {0}")]
    Validation(String),

    /// A phone pattern was malformed or had too many wildcards
    #[error("invalid pattern: {0}")]
    Pattern(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// The config file is not valid TOML for [`crate::AppConfig`]
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `TesseraError`.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
