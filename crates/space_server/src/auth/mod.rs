//! Connection gatekeeping.
//!
//! Every WebSocket handshake passes through the [`ConnectionGatekeeper`]
//! exactly once. It pulls the bearer credential out of the handshake request,
//! hands it to a [`CredentialVerifier`] and either yields the caller's
//! [`Identity`] or refuses the connection before any session exists.

pub mod jwt;

pub use jwt::{mint_token, Claims, JwtVerifier};

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

/// Identity claims attached to an admitted connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable account id
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Display name
    pub username: String,
}

/// Checks a bearer credential and decodes the identity it carries.
///
/// Signature and expiry checks live entirely behind this trait.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Validates inbound connections before a session is created.
#[derive(Clone)]
pub struct ConnectionGatekeeper {
    verifier: Arc<dyn CredentialVerifier>,
}

impl ConnectionGatekeeper {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Admits or refuses a handshake request.
    ///
    /// # Returns
    ///
    /// The decoded [`Identity`] on success, [`AuthError::MissingCredential`]
    /// when no token was presented, or the verifier's error otherwise.
    pub fn admit(&self, request: &Request) -> Result<Identity, AuthError> {
        let token = extract_credential(request).ok_or(AuthError::MissingCredential)?;
        self.verifier.verify(&token)
    }
}

impl std::fmt::Debug for ConnectionGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGatekeeper").finish_non_exhaustive()
    }
}

/// Pulls the bearer token out of a handshake request.
///
/// The `token` query parameter is checked first, then an
/// `Authorization: Bearer <token>` header. Empty values count as absent.
pub fn extract_credential(request: &Request) -> Option<String> {
    let from_query = request.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "token")
            .map(|(_, value)| value.to_string())
    });

    from_query
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptOnly(&'static str);

    impl CredentialVerifier for AcceptOnly {
        fn verify(&self, token: &str) -> Result<Identity, AuthError> {
            if token == self.0 {
                Ok(Identity {
                    user_id: "u-1".to_string(),
                    username: "ada".to_string(),
                })
            } else {
                Err(AuthError::InvalidCredential("signature mismatch".to_string()))
            }
        }
    }

    fn request(uri: &str, bearer: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_extract_from_query() {
        let req = request("/ws?foo=bar&token=abc.def.ghi", None);
        assert_eq!(extract_credential(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_from_header() {
        let req = request("/ws", Some("abc.def.ghi"));
        assert_eq!(extract_credential(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_empty_token_is_missing() {
        let req = request("/ws?token=", None);
        assert_eq!(extract_credential(&req), None);
    }

    #[test]
    fn test_admit_outcomes() {
        let gatekeeper = ConnectionGatekeeper::new(Arc::new(AcceptOnly("good")));

        let identity = gatekeeper.admit(&request("/?token=good", None)).unwrap();
        assert_eq!(identity.user_id, "u-1");

        assert_eq!(
            gatekeeper.admit(&request("/", None)),
            Err(AuthError::MissingCredential)
        );
        assert!(matches!(
            gatekeeper.admit(&request("/?token=bad", None)),
            Err(AuthError::InvalidCredential(_))
        ));
    }
}
