//! Authentication gate. Protected routes redirect anonymous callers to the
//! auth screen with a `next` parameter pointing back at the requested path.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

use crate::state::AppState;

pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool;
}

/// Accepts `Authorization: Bearer <token>` for any configured token.
pub struct StaticTokenAuthenticator {
    tokens: Vec<String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers).is_some_and(|token| self.tokens.iter().any(|t| t == token))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// `<auth_url>?next=<path>`
pub fn login_redirect_location(auth_url: &str, next: &str) -> String {
    let separator = if auth_url.contains('?') { '&' } else { '?' };
    format!("{auth_url}{separator}next={next}")
}

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.auth.is_authenticated(request.headers()) {
        return next.run(request).await;
    }

    let path = request.uri().path();
    warn!("Unauthenticated request to {path}, redirecting to auth");
    Redirect::to(&login_redirect_location(&state.config.auth_url, path)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_accepts_configured_bearer_token() {
        let auth = StaticTokenAuthenticator::new(vec!["s3cret".to_string()]);
        assert!(auth.is_authenticated(&headers_with("Bearer s3cret")));
    }

    #[test]
    fn test_rejects_unknown_missing_or_malformed_tokens() {
        let auth = StaticTokenAuthenticator::new(vec!["s3cret".to_string()]);
        assert!(!auth.is_authenticated(&headers_with("Bearer nope")));
        assert!(!auth.is_authenticated(&headers_with("Basic s3cret")));
        assert!(!auth.is_authenticated(&headers_with("Bearer ")));
        assert!(!auth.is_authenticated(&HeaderMap::new()));
    }

    #[test]
    fn test_login_redirect_location() {
        assert_eq!(
            login_redirect_location("/auth", "/upload"),
            "/auth?next=/upload"
        );
        assert_eq!(
            login_redirect_location("https://id.example.com/login?app=resumatch", "/upload"),
            "https://id.example.com/login?app=resumatch&next=/upload"
        );
    }
}
