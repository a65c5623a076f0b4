//! Error types for leadsync-core.

use thiserror::Error;

/// All errors that can arise while reading job configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    /// An optional environment variable is set but cannot be parsed.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// `dirs::home_dir()` returned `None` and no data dir was configured.
    #[error("cannot determine home directory; set $HOME or LEADSYNC_DATA_DIR")]
    HomeNotFound,
}
