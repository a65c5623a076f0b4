//! leadsync core library — lead record types, the fixed field mapping,
//! snapshot diffing, and environment configuration.
//!
//! - [`types`] — records, snapshot, and identity newtypes
//! - [`transform`] — [`diff`] and [`transform`]
//! - [`config`] — [`Config`] read from the environment
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod transform;
pub mod types;

pub use config::{Config, SnapshotLocation};
pub use error::ConfigError;
pub use transform::{diff, transform, transform_record};
pub use types::{ContactId, QuestionId, RawRecord, SessionToken, Snapshot, TransformedRecord};
