//! HTTP-style response object returned by every run.
//!
//! ```text
//! {"statusCode": 200, "body": {"session_token": .., "objetos_para_upload": N, ..}}
//! {"statusCode": 401, "body": {"message": .., "resposta": "Unauthorized"}}
//! {"statusCode": 500, "body": {"session_token": .., "created": N, .., "snapshot_error": ..}}
//! ```
//!
//! The last form is a run whose upserts happened but whose snapshot write
//! failed; it keeps the per-record outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MetabaseError, SyncError};
use crate::pipeline::JobReport;
use crate::upsert::FailureSummary;

pub const AUTH_FAILED_MESSAGE: &str = "The Client App is not authorized to access the data";
pub const QUERY_FAILED_MESSAGE: &str = "The leads question could not be executed";
pub const STORAGE_FAILED_MESSAGE: &str = "The snapshot store could not be read or written";

/// Status used when the failure has no upstream HTTP status.
const BAD_GATEWAY: u16 = 502;
const INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Report(ReportBody),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportBody {
    pub session_token: String,
    /// Records sent to the CRM (or planned, on a dry run).
    pub objetos_para_upload: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<FailureSummary>,
    pub fetched: usize,
    pub first_run: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    /// Upstream reason phrase or error description.
    pub resposta: String,
}

impl JobResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    fn error(status_code: u16, message: &str, resposta: impl Into<String>) -> Self {
        Self {
            status_code,
            body: ResponseBody::Error(ErrorBody {
                message: message.to_string(),
                resposta: resposta.into(),
            }),
        }
    }
}

impl From<&JobReport> for JobResponse {
    fn from(report: &JobReport) -> Self {
        let (status_code, message) = match &report.snapshot_error {
            Some(_) => (INTERNAL_ERROR, Some(STORAGE_FAILED_MESSAGE.to_string())),
            None => (200, None),
        };
        Self {
            status_code,
            body: ResponseBody::Report(ReportBody {
                session_token: report.session_token.as_str().to_string(),
                objetos_para_upload: report.processed(),
                created: report.batch.created(),
                updated: report.batch.updated(),
                failures: report.batch.failures(),
                fetched: report.fetched,
                first_run: report.first_run,
                dry_run: report.dry_run,
                message,
                snapshot_error: report.snapshot_error.clone(),
                started_at: report.started_at,
                finished_at: report.finished_at,
            }),
        }
    }
}

impl From<&SyncError> for JobResponse {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::Metabase(MetabaseError::Auth { status, reason }) => {
                Self::error(*status, AUTH_FAILED_MESSAGE, reason.clone())
            }
            SyncError::Metabase(MetabaseError::Query { status, reason, .. }) => {
                Self::error(*status, QUERY_FAILED_MESSAGE, reason.clone())
            }
            SyncError::Metabase(other) => {
                Self::error(BAD_GATEWAY, QUERY_FAILED_MESSAGE, other.to_string())
            }
            SyncError::Storage(other) => {
                Self::error(INTERNAL_ERROR, STORAGE_FAILED_MESSAGE, other.to_string())
            }
        }
    }
}

impl From<&Result<JobReport, SyncError>> for JobResponse {
    fn from(result: &Result<JobReport, SyncError>) -> Self {
        match result {
            Ok(report) => report.into(),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use leadsync_core::{QuestionId, SessionToken};

    use crate::error::StorageError;

    #[test]
    fn auth_failure_carries_upstream_status_and_reason() {
        let err = SyncError::Metabase(MetabaseError::Auth {
            status: 401,
            reason: "Unauthorized".to_string(),
        });
        let value = serde_json::to_value(JobResponse::from(&err)).unwrap();
        assert_eq!(
            value,
            json!({
                "statusCode": 401,
                "body": {"message": AUTH_FAILED_MESSAGE, "resposta": "Unauthorized"}
            })
        );
    }

    #[test]
    fn query_failure_uses_upstream_status() {
        let err = SyncError::Metabase(MetabaseError::Query {
            question_id: QuestionId(903),
            status: 404,
            reason: "Not Found".to_string(),
        });
        let response = JobResponse::from(&err);
        assert_eq!(response.status_code, 404);
        assert!(!response.is_success());
    }

    #[test]
    fn transport_failure_maps_to_bad_gateway() {
        let err = SyncError::Metabase(MetabaseError::Transport {
            url: "http://mb/api/session".to_string(),
            message: "connection refused".to_string(),
        });
        let response = JobResponse::from(&err);
        assert_eq!(response.status_code, 502);
        match response.body {
            ResponseBody::Error(body) => assert!(body.resposta.contains("connection refused")),
            other => panic!("expected error body, got {other:?}"),
        }
    }

    fn report(snapshot_error: Option<&str>) -> JobReport {
        JobReport {
            session_token: SessionToken::from("tok"),
            fetched: 1,
            previous: 0,
            first_run: true,
            batch: crate::upsert::plan_all(&[Default::default()]),
            dry_run: false,
            snapshot_error: snapshot_error.map(str::to_string),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn clean_report_is_200_without_snapshot_error() {
        let value = serde_json::to_value(JobResponse::from(&report(None))).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert!(value["body"].get("snapshot_error").is_none());
        assert!(value["body"].get("message").is_none());
        assert!(value["body"]["started_at"].is_string());
    }

    #[test]
    fn unsaved_snapshot_is_500_but_keeps_outcomes() {
        let response = JobResponse::from(&report(Some("I/O error at x: disk full")));
        assert!(!response.is_success());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 500);
        assert_eq!(value["body"]["message"], STORAGE_FAILED_MESSAGE);
        assert_eq!(value["body"]["snapshot_error"], "I/O error at x: disk full");
        assert_eq!(value["body"]["objetos_para_upload"], 1);
        assert_eq!(value["body"]["session_token"], "tok");
    }

    #[test]
    fn storage_failure_maps_to_internal_error() {
        let err = SyncError::Storage(StorageError::NotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        });
        assert_eq!(JobResponse::from(&err).status_code, 500);
    }
}
