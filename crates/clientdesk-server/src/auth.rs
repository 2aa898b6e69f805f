//! Identity Resolution
//!
//! Session handling is delegated to the hosted identity service; this
//! module only asks it who a bearer token belongs to and what role the
//! account carries.

#[cfg(test)]
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Account role, as stamped into the identity's app metadata
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Client,
}

/// A resolved caller
#[derive(Clone, Debug)]
pub struct Identity {
    pub role: Role,

    /// Client record this account is scoped to, for non-admin callers
    pub client_id: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Identity resolution errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token rejected by the identity service
    #[error("Invalid token")]
    InvalidToken,

    /// Identity service unreachable or misbehaving
    #[error("Auth service error: {0}")]
    Service(String),
}

/// Resolves bearer tokens to identities
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<String>,

    #[serde(default, rename = "clientId")]
    client_id: Option<String>,
}

/// Identity provider backed by the hosted auth service
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            anon_key: anon_key.into(),
        }
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .get(self.user_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Service(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Service(format!(
                "identity service returned {status}"
            )));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Service(e.to_string()))?;

        let role = match user.app_metadata.role.as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::Client,
        };

        Ok(Identity {
            role,
            client_id: user.app_metadata.client_id,
        })
    }
}

/// Fixed token → identity map (test double)
#[cfg(test)]
#[derive(Default)]
pub struct StaticAuth {
    identities: HashMap<String, Identity>,
}

#[cfg(test)]
impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_identity(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.identities.insert(token.into(), identity);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for StaticAuth {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        self.identities
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_auth_resolves_known_token() {
        let auth = StaticAuth::new().with_identity(
            "admin-token",
            Identity {
                role: Role::Admin,
                client_id: None,
            },
        );

        let identity = auth.resolve("admin-token").await.unwrap();
        assert!(identity.is_admin());

        assert!(matches!(
            auth.resolve("other").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_metadata_role_defaults_to_client() {
        let user: UserResponse =
            serde_json::from_str(r#"{"app_metadata": {"clientId": "c1"}}"#).unwrap();
        assert_eq!(user.app_metadata.role, None);
        assert_eq!(user.app_metadata.client_id.as_deref(), Some("c1"));
    }
}
