//! Bearer-token extractor for handlers that require a signed-in user.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::{Identity, bearer_token};
use crate::http::error::AppError;
use crate::http::state::AppState;
use crate::utils::error::AuthenticationError;

/// The verified caller of an authenticated route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthenticationError::MissingCredential)?;

        let identity = state.authority.verify(&token)?;
        Ok(AuthUser(identity))
    }
}
