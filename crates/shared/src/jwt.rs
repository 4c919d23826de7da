//! Identity token verification.
//!
//! Tokens are issued by the external identity provider; this module only
//! checks signature, expiry, issuer and audience, then exposes the subject,
//! the `plan` claim and the role list carried in a configurable claim.

use std::collections::HashMap;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Default claim holding the caller's role list.
pub const DEFAULT_ROLES_CLAIM: &str = "roles";

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub plan: Option<String>,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Verifies bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
    roles_claim: String,
    leeway_secs: u64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("roles_claim", &self.roles_claim)
            .field("leeway_secs", &self.leeway_secs)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    /// Creates a verifier for RS256 tokens from an RSA public key in PEM format.
    pub fn rs256(public_key_pem: &str) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;
        Ok(Self::with_key(decoding_key, Algorithm::RS256))
    }

    /// Creates a verifier for HS256 tokens signed with a shared secret.
    pub fn hs256(secret: &str) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidKey("empty secret".to_string()));
        }
        Ok(Self::with_key(
            DecodingKey::from_secret(secret.as_bytes()),
            Algorithm::HS256,
        ))
    }

    fn with_key(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        Self {
            decoding_key,
            algorithm,
            issuer: None,
            audience: None,
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_roles_claim(mut self, claim: impl Into<String>) -> Self {
        self.roles_claim = claim.into();
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Validates a token and returns the caller identity.
    pub fn verify(&self, token: &str) -> Result<Identity, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss.as_str()]);
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<HashMap<String, Value>>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidIssuer
                | jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            })?;

        let claims = token_data.claims;
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::InvalidToken)?
            .to_string();
        let plan = claims
            .get("plan")
            .and_then(Value::as_str)
            .map(str::to_string);
        let roles = match claims.get(&self.roles_claim) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };

        Ok(Identity {
            subject,
            plan,
            roles,
        })
    }
}
