//! The `auth` module is the credential service used by both the WebSocket
//! handshake and the HTTP API.
//!
//! - `jwt`: token issuance/verification and the resolved `Identity`
//! - `Accounts`: the configured login accounts
//! - `token_from_handshake`: credential extraction at connect time

pub mod jwt;

pub use jwt::{Claims, Identity, JwtAuthority};

use crate::config::UserAccount;

/// Login accounts loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    users: Vec<UserAccount>,
}

impl Accounts {
    pub fn new(users: Vec<UserAccount>) -> Self {
        Self { users }
    }

    /// Resolve an identity from email/password, if they match an account.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<Identity> {
        self.users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .map(|u| Identity {
                id: u.id,
                email: u.email.clone(),
                role: u.role.clone(),
            })
    }
}

/// Pull the credential out of a connection request.
///
/// The `token` query parameter wins; otherwise an `Authorization: Bearer`
/// header value is used.
pub fn token_from_handshake(query: Option<&str>, authorization: Option<&str>) -> Option<String> {
    let from_query = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    });

    from_query
        .filter(|t| !t.is_empty())
        .or_else(|| authorization.and_then(bearer_token))
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}
