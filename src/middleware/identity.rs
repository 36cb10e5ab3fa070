//! Caller identity resolution.
//!
//! The relay and the ledger never look at credentials themselves: handlers
//! ask an [`IdentityResolver`] for a verified [`Identity`] and trust the
//! answer. Implementations:
//! - [`AgentSecret`]: shared bearer secret for the backup agent
//! - [`crate::middleware::oidc::AccessTokenResolver`]: signed identity token from an access proxy
//! - [`TrustedHeaderResolver`]: plain email header set by a trusted proxy (development)

use axum::http::{HeaderMap, HeaderName};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The backup agent, authenticated by the shared secret.
    Agent,
    /// A human, authenticated by the identity provider.
    Approver { email: String },
}

impl Identity {
    pub fn email(&self) -> Option<&str> {
        match self {
            Identity::Agent => None,
            Identity::Approver { email } => Some(email),
        }
    }
}

pub trait IdentityResolver: Send + Sync {
    /// None means the request carries no valid credential.
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// `Authorization: Bearer <token>`, exactly as sent after the single space.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

fn mask(token: &str) -> String {
    if token.len() > 8 && token.is_char_boundary(4) && token.is_char_boundary(token.len() - 4) {
        format!("{}…{}", &token[..4], &token[token.len() - 4..])
    } else {
        "****".to_string()
    }
}

/// Shared-secret check for the agent's push endpoint.
/// With no secret configured every request is rejected.
pub struct AgentSecret {
    secret: Option<String>,
}

impl AgentSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

impl IdentityResolver for AgentSecret {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let Some(expected) = self.secret.as_deref() else {
            tracing::error!("agent secret is not configured, rejecting status push");
            return None;
        };

        match bearer_token(headers) {
            Some(provided) if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) => {
                Some(Identity::Agent)
            }
            Some(provided) => {
                // SECURITY: never log the expected secret or the full provided token
                tracing::warn!("status push: invalid bearer token (provided: '{}')", mask(provided));
                None
            }
            None => {
                tracing::warn!("status push: missing bearer token");
                None
            }
        }
    }
}

/// Reads an email from a header injected by a trusted reverse proxy.
/// Only safe when the relay is unreachable except through that proxy.
pub struct TrustedHeaderResolver {
    header: HeaderName,
}

impl TrustedHeaderResolver {
    pub fn new(header: &str) -> anyhow::Result<Self> {
        let header = HeaderName::from_bytes(header.trim().to_ascii_lowercase().as_bytes())?;
        Ok(Self { header })
    }
}

impl IdentityResolver for TrustedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let email = headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|e| !e.is_empty())?;
        Some(Identity::Approver {
            email: email.to_string(),
        })
    }
}

/// Rejects everything. Used when no approver identity source is configured.
pub struct DenyAll;

impl IdentityResolver for DenyAll {
    fn resolve(&self, _headers: &HeaderMap) -> Option<Identity> {
        None
    }
}
