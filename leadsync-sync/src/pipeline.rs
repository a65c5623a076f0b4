//! Job orchestration: authenticate, load snapshot, query, diff, transform,
//! upsert, save snapshot.
//!
//! [`run_job`] takes its three collaborators through traits so tests can
//! drive it with fakes; [`run`] wires the real clients from a [`Config`].

use chrono::{DateTime, Utc};

use leadsync_core::{
    diff, transform, Config, QuestionId, SessionToken, Snapshot, SnapshotLocation,
};

use crate::error::{StorageError, SyncError};
use crate::hubspot::{CrmClient, HubSpotClient};
use crate::metabase::{MetabaseClient, QueryClient};
use crate::snapshot_store::{BlobStore, FsBlobStore, SnapshotStore};
use crate::upsert::{self, BatchOutcome};

/// Per-run inputs that are not collaborators.
#[derive(Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub username: String,
    pub password: String,
    pub question_id: QuestionId,
    /// Query and diff only: no CRM calls, no snapshot write.
    pub dry_run: bool,
}

impl JobOptions {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            question_id: config.question_id,
            dry_run,
        }
    }
}

impl std::fmt::Debug for JobOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOptions")
            .field("username", &self.username)
            .field("question_id", &self.question_id)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Outcome of a run that got past authentication and the query.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub session_token: SessionToken,
    /// Rows returned by the query.
    pub fetched: usize,
    /// Rows in the snapshot the run started from.
    pub previous: usize,
    /// No snapshot existed before this run.
    pub first_run: bool,
    pub batch: BatchOutcome,
    pub dry_run: bool,
    /// Set when the upserts ran but the new snapshot could not be written.
    /// The next run will see every row of this one as new again.
    pub snapshot_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// Number of records sent (or, on a dry run, that would be sent).
    pub fn processed(&self) -> usize {
        self.batch.len()
    }

    pub fn snapshot_saved(&self) -> bool {
        !self.dry_run && self.snapshot_error.is_none()
    }
}

/// Run the job once against the given collaborators.
///
/// Authentication happens before anything else; a rejected login returns
/// without touching the snapshot store or the CRM. Once the query succeeds
/// the full result set becomes the new snapshot, whatever happened to the
/// individual upserts. A failed snapshot write after the upserts is reported
/// in [`JobReport::snapshot_error`] so the batch outcomes are not lost.
pub fn run_job<Q, C, B>(
    query: &Q,
    crm: &C,
    snapshots: &SnapshotStore<B>,
    options: &JobOptions,
) -> Result<JobReport, SyncError>
where
    Q: QueryClient + ?Sized,
    C: CrmClient + ?Sized,
    B: BlobStore,
{
    let started_at = Utc::now();

    let session = query.authenticate(&options.username, &options.password)?;
    tracing::info!("authenticated to query service");

    let (previous, first_run) = match snapshots.load() {
        Ok(snapshot) => (snapshot, false),
        Err(StorageError::NotFound { bucket, key }) => {
            tracing::warn!("no snapshot at {bucket}/{key}; treating every row as new");
            (Snapshot::default(), true)
        }
        Err(err) => return Err(err.into()),
    };

    let current = query.run_query(&session, options.question_id)?;
    let new_rows = diff(&current, &previous.records);
    tracing::info!(
        "question {} returned {} rows, {} new since last snapshot ({} rows)",
        options.question_id,
        current.len(),
        new_rows.len(),
        previous.len()
    );

    let transformed = transform(&new_rows);
    let batch = if options.dry_run {
        upsert::plan_all(&transformed)
    } else {
        upsert::upsert_all(crm, &transformed)
    };

    let mut snapshot_error = None;
    if options.dry_run {
        tracing::info!("[dry-run] snapshot left untouched");
    } else if let Err(err) = snapshots.save(&current) {
        tracing::error!(
            "snapshot {} not saved after {} upserts: {err}",
            snapshots.key(),
            batch.len()
        );
        snapshot_error = Some(err.to_string());
    } else {
        tracing::info!(
            "snapshot {} saved ({} rows); created {}, updated {}, failed {}",
            snapshots.key(),
            current.len(),
            batch.created(),
            batch.updated(),
            batch.failures().len()
        );
    }

    Ok(JobReport {
        session_token: session,
        fetched: current.len(),
        previous: previous.len(),
        first_run,
        batch,
        dry_run: options.dry_run,
        snapshot_error,
        started_at,
        finished_at: Utc::now(),
    })
}

/// The filesystem snapshot store at `location`.
pub fn snapshot_store(location: &SnapshotLocation) -> SnapshotStore<FsBlobStore> {
    SnapshotStore::new(
        FsBlobStore::new(&location.data_dir, &location.bucket),
        &location.key,
    )
}

/// Run the job with the real query service, CRM, and filesystem blob store.
pub fn run(config: &Config, dry_run: bool) -> Result<JobReport, SyncError> {
    let query = MetabaseClient::new(&config.metabase_url, config.request_timeout);
    let crm = HubSpotClient::new(
        &config.hubspot_api_base,
        &config.hubspot_api_key,
        config.request_timeout,
    );
    run_job(
        &query,
        &crm,
        &snapshot_store(&config.snapshot),
        &JobOptions::from_config(config, dry_run),
    )
}
