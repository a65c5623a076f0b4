//! HubSpot CRM v3 contacts client.
//!
//! Create is the only call whose failure is part of the normal flow: a 409
//! means "a contact with this email already exists" and is reported as
//! [`CreateOutcome::Conflict`] rather than as an error.
//!
//! Lookup reads the contact with email as the alternate id
//! (`GET /crm/v3/objects/contacts/{email}?idProperty=email`); a 404 means no
//! contact has that email.

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use leadsync_core::ContactId;

use crate::error::HubSpotError;

/// Contact properties as sent to the CRM: property name -> string value.
pub type PropertySet = BTreeMap<String, String>;

/// Result of a contact create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ContactId),
    /// A contact with the same email already exists.
    Conflict,
    Failed(String),
}

/// The three CRM operations the upserter needs.
pub trait CrmClient {
    fn create(&self, properties: &PropertySet) -> CreateOutcome;

    /// Find a contact by its email. `Ok(None)` when nobody has that email.
    fn lookup_by_email(&self, email: &str) -> Result<Option<ContactId>, HubSpotError>;

    fn update(&self, id: &ContactId, properties: &PropertySet) -> Result<(), HubSpotError>;
}

#[derive(Debug, Serialize)]
struct ContactInput<'a> {
    properties: &'a PropertySet,
}

#[derive(Debug, Deserialize)]
struct HubspotObject {
    id: String,
}

/// Characters left as-is in a path segment; everything else is escaped, so
/// `a@x.com` becomes `a%40x.com` and `+` or `/` cannot change the route.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Blocking `ureq` implementation of [`CrmClient`] using a private-app token.
#[derive(Clone)]
pub struct HubSpotClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for HubSpotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSpotClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl HubSpotClient {
    pub fn new(api_base: &str, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn contacts_url(&self) -> String {
        format!("{}/crm/v3/objects/contacts", self.api_base)
    }

    fn contact_by_email_url(&self, email: &str) -> String {
        format!(
            "{}/{}",
            self.contacts_url(),
            utf8_percent_encode(email, PATH_SEGMENT)
        )
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        body: impl Serialize,
    ) -> Result<ureq::Response, HubSpotError> {
        self.agent
            .request(method, url)
            .set("Authorization", &self.auth_header())
            .send_json(body)
            .map_err(into_hubspot_error)
    }
}

impl CrmClient for HubSpotClient {
    fn create(&self, properties: &PropertySet) -> CreateOutcome {
        let url = self.contacts_url();
        let response = match self.send("POST", &url, ContactInput { properties }) {
            Ok(response) => response,
            Err(HubSpotError::Status { status: 409, .. }) => return CreateOutcome::Conflict,
            Err(err) => return CreateOutcome::Failed(err.to_string()),
        };
        match read_json::<HubspotObject>(response) {
            Ok(object) => CreateOutcome::Created(ContactId(object.id)),
            Err(err) => CreateOutcome::Failed(err.to_string()),
        }
    }

    fn lookup_by_email(&self, email: &str) -> Result<Option<ContactId>, HubSpotError> {
        let url = self.contact_by_email_url(email);
        let response = match self
            .agent
            .get(&url)
            .query("idProperty", "email")
            .set("Authorization", &self.auth_header())
            .call()
            .map_err(into_hubspot_error)
        {
            Ok(response) => response,
            Err(HubSpotError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let object: HubspotObject = read_json(response)?;
        Ok(Some(ContactId(object.id)))
    }

    fn update(&self, id: &ContactId, properties: &PropertySet) -> Result<(), HubSpotError> {
        let url = format!("{}/{}", self.contacts_url(), id);
        self.send("PATCH", &url, ContactInput { properties })?;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, HubSpotError> {
    let body = response
        .into_string()
        .map_err(|e| HubSpotError::Decode(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| HubSpotError::Decode(e.to_string()))
}

fn into_hubspot_error(err: ureq::Error) -> HubSpotError {
    match err {
        ureq::Error::Status(status, response) => HubSpotError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(err) => HubSpotError::Transport(err.to_string()),
    }
}
