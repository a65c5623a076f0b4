//! Error types for leadsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use leadsync_core::types::{ContactId, QuestionId};

/// Failures reading or writing the snapshot blob.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No blob stored under the key.
    #[error("snapshot blob {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    /// The blob exists but is not a JSON array of records.
    #[error("snapshot blob {bucket}/{key} is malformed: {source}")]
    Malformed {
        bucket: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot serialization error (save path).
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures talking to the query service. Every variant is fatal for the job.
#[derive(Debug, Error)]
pub enum MetabaseError {
    /// Login rejected; `reason` is the upstream reason phrase.
    #[error("query service rejected login ({status} {reason})")]
    Auth { status: u16, reason: String },

    /// Query execution rejected.
    #[error("query {question_id} rejected ({status} {reason})")]
    Query {
        question_id: QuestionId,
        status: u16,
        reason: String,
    },

    /// Connection, DNS, TLS or timeout failure; no HTTP status available.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Failures talking to the CRM outside the typed create outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubSpotError {
    /// Non-success HTTP status; `body` is the raw upstream payload.
    #[error("CRM returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("CRM transport error: {0}")]
    Transport(String),

    #[error("unexpected CRM response body: {0}")]
    Decode(String),
}

/// Why a single record did not make it into the CRM.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpsertFailure {
    /// Create failed for a reason other than a duplicate email.
    #[error("create rejected: {0}")]
    CreateRejected(String),

    /// Create reported a duplicate, but the record carries no email to look up.
    #[error("duplicate contact but record has no email")]
    MissingEmail,

    /// Create reported a duplicate, but no contact exists under the email.
    #[error("duplicate contact reported but no contact found for {email}")]
    LookupMiss { email: String },

    #[error("lookup by email failed: {0}")]
    LookupFailed(HubSpotError),

    #[error("update of contact {id} failed: {source}")]
    UpdateFailed {
        id: ContactId,
        #[source]
        source: HubSpotError,
    },
}

/// All fatal errors that abort a job run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("query service error: {0}")]
    Metabase(#[from] MetabaseError),

    #[error("snapshot storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience constructor for [`StorageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.into(),
        source,
    }
}
