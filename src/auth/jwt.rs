//! HS256 token issuance and verification.
//!
//! Tokens carry the principal's id, email and role so a WebSocket connection
//! can be admitted with its identity without any storage lookup.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::utils::error::AuthenticationError;

/// The principal resolved from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct JwtAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtAuthority {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AuthenticationError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthenticationError::Invalid("token lifetime out of range".into()))?;
        let claims = Claims {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthenticationError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(Identity {
            id: data.claims.sub,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}

impl std::fmt::Debug for JwtAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
