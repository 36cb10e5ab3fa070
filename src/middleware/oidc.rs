//! Access-proxy identity tokens.
//!
//! An access proxy in front of the relay signs a short-lived JWT for every
//! authenticated human and forwards it in `Cf-Access-Jwt-Assertion` (or as a
//! bearer token). We verify signature, expiry, and optionally issuer and
//! audience, then take the `email` claim as the approver identity.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::identity::{bearer_token, Identity, IdentityResolver};

pub const ASSERTION_HEADER: &str = "cf-access-jwt-assertion";

/// Claims we read from the token. Anything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: Option<String>,
    pub sub: Option<String>,
    pub exp: i64,
}

pub struct AccessTokenResolver {
    key: DecodingKey,
    validation: Validation,
}

impl AccessTokenResolver {
    /// Tokens signed with a shared HMAC secret.
    pub fn hs256(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        Self::build(
            DecodingKey::from_secret(secret.as_bytes()),
            Algorithm::HS256,
            issuer,
            audience,
        )
    }

    /// Tokens signed by the proxy's RSA key.
    pub fn rs256_pem(
        public_key_pem: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> anyhow::Result<Self> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
        Ok(Self::build(key, Algorithm::RS256, issuer, audience))
    }

    fn build(
        key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self { key, validation }
    }

    /// Verify a raw token and return its claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        decode::<AccessClaims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

impl IdentityResolver for AccessTokenResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = headers
            .get(ASSERTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| bearer_token(headers).map(str::trim))?;

        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("access token rejected: {}", e);
                return None;
            }
        };

        match claims.email.filter(|e| !e.is_empty()) {
            Some(email) => Some(Identity::Approver { email }),
            None => {
                tracing::warn!(sub = ?claims.sub, "access token has no email claim");
                None
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
