//! # leadsync-sync
//!
//! Snapshot-gated lead sync from the query service into the CRM.
//!
//! Call [`pipeline::run`] with a [`leadsync_core::Config`] to run the job
//! against the real services, or [`run_job`] with your own
//! [`QueryClient`] / [`CrmClient`] / [`BlobStore`] implementations.

pub mod error;
pub mod hubspot;
pub mod metabase;
pub mod pipeline;
pub mod response;
pub mod snapshot_store;
pub mod upsert;

pub use error::{HubSpotError, MetabaseError, StorageError, SyncError, UpsertFailure};
pub use hubspot::{CreateOutcome, CrmClient, HubSpotClient, PropertySet};
pub use metabase::{MetabaseClient, QueryClient};
pub use pipeline::{run_job, JobOptions, JobReport};
pub use response::JobResponse;
pub use snapshot_store::{BlobStore, FsBlobStore, MemoryBlobStore, SnapshotStore};
pub use upsert::{BatchOutcome, RecordOutcome, UpsertAction};
