//! Query service client (Metabase session + saved-question API).
//!
//! Two calls, both blocking and both fatal on failure:
//!
//! 1. `POST {base}/api/session` `{username, password}` -> `{id}`
//! 2. `POST {base}/api/card/{question}/query/json` with
//!    `X-Metabase-Session: <id>` -> JSON array of row objects

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use leadsync_core::{QuestionId, RawRecord, SessionToken};

use crate::error::MetabaseError;

pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// The two query-service operations the job needs.
pub trait QueryClient {
    /// Log in and obtain a session token.
    fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken, MetabaseError>;

    /// Execute a saved question and return its rows.
    fn run_query(
        &self,
        session: &SessionToken,
        question: QuestionId,
    ) -> Result<Vec<RawRecord>, MetabaseError>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
}

/// Blocking `ureq` implementation of [`QueryClient`].
#[derive(Debug, Clone)]
pub struct MetabaseClient {
    agent: ureq::Agent,
    base_url: String,
}

impl MetabaseClient {
    /// `base_url` should be like `https://metabase.example.com` (no trailing slash).
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self) -> String {
        format!("{}/api/session", self.base_url)
    }

    fn query_url(&self, question: QuestionId) -> String {
        format!("{}/api/card/{}/query/json", self.base_url, question)
    }
}

impl QueryClient for MetabaseClient {
    fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken, MetabaseError> {
        let url = self.session_url();
        tracing::info!("authenticating against {url}");

        let response = match self
            .agent
            .post(&url)
            .send_json(json!({ "username": username, "password": password }))
        {
            Ok(response) if response.status() == 200 => response,
            Ok(response) => {
                return Err(MetabaseError::Auth {
                    status: response.status(),
                    reason: response.status_text().to_string(),
                })
            }
            Err(ureq::Error::Status(status, response)) => {
                return Err(MetabaseError::Auth {
                    status,
                    reason: response.status_text().to_string(),
                })
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(MetabaseError::Transport {
                    url,
                    message: err.to_string(),
                })
            }
        };

        let body = response
            .into_string()
            .map_err(|e| decode_err(&url, e))?;
        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| decode_err(&url, e))?;
        Ok(SessionToken(session.id))
    }

    fn run_query(
        &self,
        session: &SessionToken,
        question: QuestionId,
    ) -> Result<Vec<RawRecord>, MetabaseError> {
        let url = self.query_url(question);
        tracing::info!("running question {question}");

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/x-www-form-urlencoded")
            .set(SESSION_HEADER, session.as_str())
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => MetabaseError::Query {
                    question_id: question,
                    status,
                    reason: response.status_text().to_string(),
                },
                ureq::Error::Transport(err) => MetabaseError::Transport {
                    url: url.clone(),
                    message: err.to_string(),
                },
            })?;

        let body = response
            .into_string()
            .map_err(|e| decode_err(&url, e))?;
        decode_rows(&url, &body)
    }
}

/// Parse a `query/json` body. Anything but an array of objects is rejected,
/// including the `{"error": ...}` objects the service returns for failed
/// queries with a 2xx status.
pub(crate) fn decode_rows(url: &str, body: &str) -> Result<Vec<RawRecord>, MetabaseError> {
    serde_json::from_str::<Vec<RawRecord>>(body).map_err(|e| decode_err(url, e))
}

fn decode_err(url: &str, err: impl std::fmt::Display) -> MetabaseError {
    MetabaseError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    }
}
