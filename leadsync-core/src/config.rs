//! Job configuration read from the process environment.
//!
//! # API pattern
//!
//! - `Config::from_lookup(f)`: reads every variable through `f`; used in tests
//! - `Config::from_env()`: delegates to `from_lookup` with `std::env::var`
//!
//! Tests must NEVER call `from_env`; the process environment is shared.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::QuestionId;

pub const ENV_METABASE_URL: &str = "METABASE_URL";
pub const ENV_USERNAME: &str = "USERNAME";
pub const ENV_PASSWORD: &str = "PASSWORD";
pub const ENV_HUBSPOT_API_KEY: &str = "HUBSPOT_API_KEY";
pub const ENV_HUBSPOT_API_BASE: &str = "HUBSPOT_API_BASE";
pub const ENV_DATA_DIR: &str = "LEADSYNC_DATA_DIR";
pub const ENV_SNAPSHOT_BUCKET: &str = "SNAPSHOT_BUCKET";
pub const ENV_SNAPSHOT_KEY: &str = "SNAPSHOT_KEY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";

pub const DEFAULT_HUBSPOT_API_BASE: &str = "https://api.hubapi.com";
pub const DEFAULT_SNAPSHOT_BUCKET: &str = "leadscheckout";
pub const DEFAULT_SNAPSHOT_KEY: &str = "json_atual.json";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The saved question holding the checkout leads.
pub const LEADS_QUESTION_ID: QuestionId = QuestionId(903);

/// Everything the job needs to talk to its three collaborators.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub metabase_url: String,
    pub username: String,
    pub password: String,
    pub hubspot_api_key: String,
    pub hubspot_api_base: String,
    pub snapshot: SnapshotLocation,
    pub request_timeout: Duration,
    pub question_id: QuestionId,
}

/// Where the snapshot blob lives. Needs no credentials, so the snapshot
/// maintenance commands can read it on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLocation {
    /// Root under which each bucket is a directory.
    pub data_dir: PathBuf,
    pub bucket: String,
    pub key: String,
}

impl SnapshotLocation {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        Ok(Self {
            data_dir,
            bucket: get(ENV_SNAPSHOT_BUCKET).unwrap_or_else(|| DEFAULT_SNAPSHOT_BUCKET.to_string()),
            key: get(ENV_SNAPSHOT_KEY).unwrap_or_else(|| DEFAULT_SNAPSHOT_KEY.to_string()),
        })
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing { var });

        let metabase_url = required(ENV_METABASE_URL)?
            .trim_end_matches('/')
            .to_string();
        let username = required(ENV_USERNAME)?;
        let password = required(ENV_PASSWORD)?;
        let hubspot_api_key = required(ENV_HUBSPOT_API_KEY)?;

        let hubspot_api_base = get(ENV_HUBSPOT_API_BASE)
            .unwrap_or_else(|| DEFAULT_HUBSPOT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let snapshot = SnapshotLocation::from_lookup(&lookup)?;

        let request_timeout = match get(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            metabase_url,
            username,
            password,
            hubspot_api_key,
            hubspot_api_base,
            snapshot,
            request_timeout,
            question_id: LEADS_QUESTION_ID,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("metabase_url", &self.metabase_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hubspot_api_key", &"<redacted>")
            .field("hubspot_api_base", &self.hubspot_api_base)
            .field("snapshot", &self.snapshot)
            .field("request_timeout", &self.request_timeout)
            .field("question_id", &self.question_id)
            .finish()
    }
}

/// `<home>/.leadsync/blobs`
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(home.join(".leadsync").join("blobs"))
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var: ENV_REQUEST_TIMEOUT_SECS,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number of seconds"))?;
    if secs == 0 {
        return Err(invalid("timeout must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
