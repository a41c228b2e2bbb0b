//! Shared-secret authentication.

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::Result;

/// Prefix of a bearer credential in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Query parameter carrying the credential when headers are unavailable.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Validates the credential presented with a connection.
///
/// The secret is fixed at startup and only ever read afterwards.
#[derive(Clone)]
pub struct AuthGate {
    secret: Option<String>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl AuthGate {
    /// Create a gate for `secret`. An empty secret counts as none.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether a secret has been configured.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Check a presented credential.
    ///
    /// Fails with `Misconfigured` when no secret is configured and with
    /// `Unauthenticated` when the credential is absent, empty, or different.
    pub fn check(&self, presented: Option<&str>) -> Result<()> {
        let Some(secret) = self.secret.as_deref() else {
            warn!(target: "shell_bridge::audit", outcome = "misconfigured", "Connection refused: no secret configured");
            return Err(BridgeError::Misconfigured);
        };

        let reason = match presented {
            None => "missing",
            Some("") => "empty",
            Some(value) if !constant_time_eq(value.as_bytes(), secret.as_bytes()) => "mismatch",
            Some(_) => {
                info!(target: "shell_bridge::audit", outcome = "accepted", "Credential accepted");
                return Ok(());
            }
        };

        warn!(target: "shell_bridge::audit", outcome = "rejected", reason, "Credential rejected");
        Err(BridgeError::Unauthenticated)
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the credential from `Authorization: Bearer …` or the `token` query parameter.
///
/// The header wins when both are present. A malformed header yields an
/// empty credential rather than falling through to the query.
pub fn extract_credential(headers: &HeaderMap, uri: &axum::http::Uri) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().unwrap_or_default();
        return Some(value.strip_prefix(BEARER_PREFIX).unwrap_or_default().to_string());
    }

    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// Authentication middleware for axum.
///
/// Runs the gate before any handler, so a rejected request never reaches
/// code that could spawn a process. On success the request carries an
/// [`Admission`](crate::bridge::Admission) extension that data-plane handlers open sessions with.
pub async fn auth_middleware(
    State(bridge): State<Bridge>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let credential = extract_credential(request.headers(), request.uri());

    match bridge.authenticate(credential.as_deref()) {
        Ok(admission) => {
            request.extensions_mut().insert(admission);
            Ok(next.run(request).await)
        }
        Err(BridgeError::Misconfigured) => Err(StatusCode::SERVICE_UNAVAILABLE),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    #[test]
    fn test_exact_match_accepted() {
        let gate = AuthGate::new(Some("tok-A".into()));
        assert!(gate.check(Some("tok-A")).is_ok());
    }

    #[test]
    fn test_rejections() {
        let gate = AuthGate::new(Some("tok-A".into()));
        for presented in [None, Some(""), Some("tok-B"), Some("tok-A "), Some("tok-")] {
            assert!(
                matches!(gate.check(presented), Err(BridgeError::Unauthenticated)),
                "{presented:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_misconfigured() {
        for gate in [AuthGate::new(None), AuthGate::new(Some(String::new()))] {
            assert!(!gate.is_configured());
            assert!(matches!(gate.check(Some("anything")), Err(BridgeError::Misconfigured)));
            assert!(matches!(gate.check(None), Err(BridgeError::Misconfigured)));
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let gate = AuthGate::new(Some("super-secret".into()));
        assert!(!format!("{gate:?}").contains("super-secret"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_extract_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer my-secret"));
        let uri: Uri = "/api/v1/ws?token=other".parse().unwrap();
        assert_eq!(extract_credential(&headers, &uri), Some("my-secret".into()));
    }

    #[test]
    fn test_extract_wrong_scheme_is_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let uri: Uri = "/api/v1/ws".parse().unwrap();
        assert_eq!(extract_credential(&headers, &uri), Some(String::new()));
    }

    #[test]
    fn test_extract_from_query() {
        let headers = HeaderMap::new();
        let uri: Uri = "/api/v1/ws?rows=40&token=tok%2DA".parse().unwrap();
        assert_eq!(extract_credential(&headers, &uri), Some("tok-A".into()));

        let uri: Uri = "/api/v1/ws?rows=40".parse().unwrap();
        assert_eq!(extract_credential(&headers, &uri), None);
    }
}
