//! Create-or-update of transformed leads, keyed by email.
//!
//! ## Per-record protocol
//!
//! 1. Build the property set (truthy values only, stringified).
//! 2. `create`.
//! 3. On [`CreateOutcome::Conflict`]: `lookup_by_email`, then `update` the
//!    contact id the lookup returned with the same property set.
//!
//! A failure at any step is recorded against that record and the batch moves
//! on; nothing here aborts the run.

use serde::Serialize;
use serde_json::Value;

use leadsync_core::{ContactId, TransformedRecord};

use crate::error::UpsertFailure;
use crate::hubspot::{CreateOutcome, CrmClient, PropertySet};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    Created(ContactId),
    Updated(ContactId),
    Failed(UpsertFailure),
    /// Dry run: the record *would* have been sent.
    WouldUpsert,
}

/// One record's outcome, tagged with its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub index: usize,
    pub email: Option<String>,
    pub action: UpsertAction,
}

/// Failure entry as it appears in the job summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub index: usize,
    pub email: Option<String>,
    pub reason: String,
}

/// Accumulated outcomes for a batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub records: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn created(&self) -> usize {
        self.count(|a| matches!(a, UpsertAction::Created(_)))
    }

    pub fn updated(&self) -> usize {
        self.count(|a| matches!(a, UpsertAction::Updated(_)))
    }

    pub fn would_upsert(&self) -> usize {
        self.count(|a| matches!(a, UpsertAction::WouldUpsert))
    }

    pub fn failures(&self) -> Vec<FailureSummary> {
        self.records
            .iter()
            .filter_map(|r| match &r.action {
                UpsertAction::Failed(failure) => Some(FailureSummary {
                    index: r.index,
                    email: r.email.clone(),
                    reason: failure.to_string(),
                }),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&UpsertAction) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.action)).count()
    }
}

// ---------------------------------------------------------------------------
// Property set
// ---------------------------------------------------------------------------

/// Build the CRM property set for a record.
///
/// Falsy values (null, false, 0, "", empty array/object) are omitted rather
/// than sent as explicit clears. Non-string scalars are stringified.
pub fn properties_for(record: &TransformedRecord) -> PropertySet {
    record
        .iter()
        .filter(|(_, value)| is_truthy(value))
        .map(|(key, value)| (key.clone(), property_value(value)))
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn property_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Upsert
// ---------------------------------------------------------------------------

/// Create-or-update a single record.
pub fn upsert_one<C: CrmClient + ?Sized>(crm: &C, record: &TransformedRecord) -> UpsertAction {
    let properties = properties_for(record);

    match crm.create(&properties) {
        CreateOutcome::Created(id) => UpsertAction::Created(id),
        CreateOutcome::Failed(reason) => UpsertAction::Failed(UpsertFailure::CreateRejected(reason)),
        CreateOutcome::Conflict => {
            let Some(email) = properties.get("email") else {
                return UpsertAction::Failed(UpsertFailure::MissingEmail);
            };
            let id = match crm.lookup_by_email(email) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    return UpsertAction::Failed(UpsertFailure::LookupMiss {
                        email: email.clone(),
                    })
                }
                Err(err) => return UpsertAction::Failed(UpsertFailure::LookupFailed(err)),
            };
            match crm.update(&id, &properties) {
                Ok(()) => UpsertAction::Updated(id),
                Err(source) => UpsertAction::Failed(UpsertFailure::UpdateFailed { id, source }),
            }
        }
    }
}

/// Upsert every record in order, collecting one outcome per record.
pub fn upsert_all<C: CrmClient + ?Sized>(crm: &C, records: &[TransformedRecord]) -> BatchOutcome {
    let mut outcomes = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let email = record.email().map(str::to_string);
        let action = upsert_one(crm, record);
        match &action {
            UpsertAction::Created(id) => {
                tracing::debug!("created contact {id} for {}", display_email(&email))
            }
            UpsertAction::Updated(id) => {
                tracing::debug!("updated contact {id} for {}", display_email(&email))
            }
            UpsertAction::Failed(failure) => {
                tracing::warn!("record {index} ({}) failed: {failure}", display_email(&email))
            }
            UpsertAction::WouldUpsert => {}
        }
        outcomes.push(RecordOutcome {
            index,
            email,
            action,
        });
    }
    BatchOutcome { records: outcomes }
}

/// Dry-run counterpart of [`upsert_all`]: no CRM calls are made.
pub fn plan_all(records: &[TransformedRecord]) -> BatchOutcome {
    let outcomes = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            tracing::info!(
                "[dry-run] would upsert {} ({} properties)",
                display_email(&record.email().map(str::to_string)),
                properties_for(record).len()
            );
            RecordOutcome {
                index,
                email: record.email().map(str::to_string),
                action: UpsertAction::WouldUpsert,
            }
        })
        .collect();
    BatchOutcome { records: outcomes }
}

fn display_email(email: &Option<String>) -> &str {
    email.as_deref().unwrap_or("<no email>")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
