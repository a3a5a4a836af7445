//! HTTP authentication middleware

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const FORBIDDEN_DETAIL: &str = "Invalid or missing API key";

/// Bearer token authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    token: Option<Arc<str>>,
}

impl AuthConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.map(Into::into),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Whether the request carries `Authorization: Bearer <token>` matching the key
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(ref expected) = self.token else {
            return true;
        };

        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|provided| provided == expected.as_ref())
    }
}

/// Reject requests without the configured bearer token with 403
pub async fn bearer_auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    if auth.authorize(request.headers()) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "detail": FORBIDDEN_DETAIL })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_auth_config_disabled() {
        let config = AuthConfig::new(None);
        assert!(!config.is_enabled());
        assert!(config.authorize(&HeaderMap::new()));
    }

    #[test]
    fn test_auth_config_enabled() {
        let config = AuthConfig::new(Some("test-token".to_string()));
        assert!(config.is_enabled());
    }

    #[test]
    fn test_matching_token_authorized() {
        let config = AuthConfig::new(Some("test-token".to_string()));
        assert!(config.authorize(&headers("Bearer test-token")));
    }

    #[test]
    fn test_wrong_or_missing_token_rejected() {
        let config = AuthConfig::new(Some("test-token".to_string()));
        assert!(!config.authorize(&HeaderMap::new()));
        assert!(!config.authorize(&headers("Bearer other")));
        assert!(!config.authorize(&headers("Basic dGVzdDp0ZXN0")));
        assert!(!config.authorize(&headers("test-token")));
    }
}
