//! Identity collaborator seams.
//!
//! The identity provider is external: the core only needs a bearer token and
//! the viewer's organization and role. Both are passed in explicitly at mount
//! time; nothing here reads ambient state.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{LiveError, Result};

/// Source of bearer tokens. Must tolerate concurrent calls from several views.
#[async_trait]
pub trait Credentials: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, e.g. from `STATUSPAGE_TOKEN`.
#[derive(Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        StaticCredentials {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Credentials for StaticCredentials {
    async fn token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(LiveError::Credentials("token is empty".to_string()));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member(String),
}

impl Role {
    pub fn from_claim(value: &str) -> Self {
        match value.trim() {
            "admin" | "org:admin" => Role::Admin,
            other => Role::Member(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Member(name) => name.as_str(),
        }
    }
}

/// Who is looking at a view.
///
/// `org_id` is `None` until the identity provider has resolved the active
/// organization; a view mounted in that state applies no events at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: Option<String>,
    pub org_id: Option<String>,
    pub role: Role,
}

impl ViewerContext {
    pub fn new(org_id: Option<String>, role: Role) -> Self {
        ViewerContext {
            user_id: None,
            org_id: org_id.filter(|id| !id.trim().is_empty()),
            role,
        }
    }

    pub fn unresolved() -> Self {
        ViewerContext::new(None, Role::Member(String::new()))
    }

    /// Gates create/edit/delete affordances. Never used to filter events.
    pub fn can_manage(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_manage(&self, action: &str) -> Result<()> {
        if self.can_manage() {
            Ok(())
        } else {
            Err(LiveError::Forbidden {
                action: action.to_string(),
            })
        }
    }
}

/// Body of `GET /user/`: `{"message": {"id": .., "org": {"id", "rol", "slg"}}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ViewerResponse {
    message: ViewerClaims,
}

#[derive(Debug, Deserialize)]
struct ViewerClaims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    org: Option<OrgClaims>,
}

#[derive(Debug, Deserialize)]
struct OrgClaims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    rol: Option<String>,
}

impl From<ViewerResponse> for ViewerContext {
    fn from(response: ViewerResponse) -> Self {
        let claims = response.message;
        let (org_id, role) = match claims.org {
            Some(org) => (org.id, Role::from_claim(org.rol.as_deref().unwrap_or(""))),
            None => (None, Role::Member(String::new())),
        };
        let mut viewer = ViewerContext::new(org_id, role);
        viewer.user_id = claims.id;
        viewer
    }
}
