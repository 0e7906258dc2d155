//! REST collaborator: initial fetch, refresh, and the admin write calls.
//!
//! The client does no retries and no caching. Every non-success status comes
//! back as [`LiveError::Fetch`] carrying the backend's `error` message when it
//! sent one, so views can show it inline next to their last good data.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statuspage_protocol::{EntityKind, Record, RecordId};
use url::Url;

use crate::auth::{Credentials, ViewerContext, ViewerResponse};
use crate::error::{LiveError, Result};
use crate::live::{FetchTarget, Snapshot};
use crate::status::{IncidentStatus, ServiceStatus};

/// Where views get their authoritative snapshots from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, target: FetchTarget) -> Result<Snapshot>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedService {
    pub service_id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncidentForm {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub status: IncidentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub linked_services: Vec<LinkedService>,
}

impl IncidentForm {
    pub fn new(title: impl Into<String>, status: IncidentStatus) -> Self {
        IncidentForm {
            title: title.into(),
            description: String::new(),
            status,
            started_at: None,
            linked_services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceForm {
    pub name: String,
    pub status: ServiceStatus,
}

/// Incident edits carry the id as a string; service edits as a number.
#[derive(Serialize)]
struct IncidentEdit<'a> {
    id: String,
    #[serde(flatten)]
    form: &'a IncidentForm,
}

#[derive(Serialize)]
struct ServiceEdit<'a> {
    id: RecordId,
    #[serde(flatten)]
    form: &'a ServiceForm,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct StatusApi {
    base: Url,
    http: reqwest::Client,
    credentials: Arc<dyn Credentials>,
}

impl StatusApi {
    pub fn new(base: Url, credentials: Arc<dyn Credentials>) -> Self {
        StatusApi {
            base,
            http: reqwest::Client::new(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn list(&self, entity: EntityKind) -> Result<Vec<Record>> {
        let path = match entity {
            EntityKind::Incident => "/user/get-incidents",
            EntityKind::Service => "/user/get-services",
        };
        let failure = format!("Failed to fetch {}s", entity);
        // The backend encodes an empty list as `null`.
        let records: Option<Vec<Record>> = self.call(Method::GET, path, None, &failure).await?;
        Ok(records.unwrap_or_default())
    }

    pub async fn get(&self, entity: EntityKind, id: RecordId) -> Result<Record> {
        let path = format!("/user/get-{}/{}", entity, id);
        let failure = format!("Failed to fetch {}", entity);
        self.call(Method::GET, &path, None, &failure).await
    }

    /// Resolves the caller's organization and role.
    pub async fn viewer(&self) -> Result<ViewerContext> {
        let response: ViewerResponse = self
            .call(Method::GET, "/user/", None, "Failed to load user info")
            .await?;
        Ok(ViewerContext::from(response))
    }

    pub async fn create_incident(&self, form: &IncidentForm) -> Result<Value> {
        let body = to_body(form)?;
        self.call(
            Method::POST,
            "/admin/create-incident",
            Some(body),
            "Failed to create incident",
        )
        .await
    }

    pub async fn create_service(&self, form: &ServiceForm) -> Result<Value> {
        let body = to_body(form)?;
        self.call(
            Method::POST,
            "/admin/create-service",
            Some(body),
            "Failed to create service",
        )
        .await
    }

    pub async fn edit_incident(&self, id: RecordId, form: &IncidentForm) -> Result<Value> {
        let body = to_body(&IncidentEdit {
            id: id.to_string(),
            form,
        })?;
        self.call(
            Method::PUT,
            "/admin/edit-incident",
            Some(body),
            "Failed to update incident",
        )
        .await
    }

    pub async fn edit_service(&self, id: RecordId, form: &ServiceForm) -> Result<Value> {
        let body = to_body(&ServiceEdit { id, form })?;
        self.call(
            Method::PUT,
            "/admin/edit-service",
            Some(body),
            "Failed to update service",
        )
        .await
    }

    pub async fn delete(&self, entity: EntityKind, id: RecordId) -> Result<Value> {
        let path = format!("/admin/delete-{}/{}", entity, id);
        let failure = format!("Failed to delete {}", entity);
        self.call(Method::DELETE, &path, None, &failure).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        failure: &str,
    ) -> Result<T> {
        let url = route(&self.base, path);
        let token = self.credentials.token().await?;

        let mut request: RequestBuilder = self.http.request(method.clone(), url.clone());
        request = request.bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::warn!(method = %method, url = %url, error = %err, "Backend request failed");
            LiveError::fetch(None, format!("{}: {}", failure, err))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text).unwrap_or_else(|| failure.to_string());
            tracing::warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                message = %message,
                "Backend returned an error status"
            );
            return Err(LiveError::fetch(Some(status.as_u16()), message));
        }

        response.json::<T>().await.map_err(|err| {
            LiveError::fetch(
                Some(status.as_u16()),
                format!("{}: invalid response body: {}", failure, err),
            )
        })
    }
}

#[async_trait]
impl RecordSource for StatusApi {
    async fn fetch(&self, target: FetchTarget) -> Result<Snapshot> {
        match target {
            FetchTarget::Collection(entity) => self.list(entity).await.map(Snapshot::Collection),
            FetchTarget::Record(entity, id) => self.get(entity, id).await.map(Snapshot::Record),
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| LiveError::Json {
        context: "request body".to_string(),
        source,
    })
}

fn route(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", prefix, path));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Extracts the backend's `{"error": "..."}` message, if any.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|body| body.error)
        .filter(|message| !message.trim().is_empty())
}
