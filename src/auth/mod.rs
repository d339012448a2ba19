//! Bearer token authentication.
//!
//! Routes opt into token enforcement by layering [`require_bearer`]; the
//! decoded [`Claims`] are then available to handlers as a request extension.

mod password;
mod token;

pub use password::*;
pub use token::*;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Reject requests without a valid `Authorization: Bearer <token>` header.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = tokens.decode(token)?;
    tracing::debug!(username = %claims.username, "Bearer token accepted");

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Perform constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    use crate::models::User;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new("secret", Duration::from_secs(60)))
    }

    fn app(tokens: Arc<TokenService>) -> Router {
        Router::new()
            .route(
                "/who",
                get(|Extension(claims): Extension<Claims>| async move { claims.username }),
            )
            .route_layer(middleware::from_fn_with_state(tokens, require_bearer))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"test-key-123", b"test-key-123"));
        assert!(!constant_time_eq(b"test-key-123", b"test-key-124"));
        assert!(!constant_time_eq(b"short", b"much-longer-key"));
        assert!(constant_time_eq(b"", b""));
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let response = app(tokens())
            .oneshot(HttpRequest::get("/who").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let response = app(tokens())
            .oneshot(
                HttpRequest::get("/who")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_exposes_claims() {
        let tokens = tokens();
        let token = tokens.issue(&User {
            username: "alice".into(),
            password_hash: String::new(),
            id: "u-1".into(),
        });

        let response = app(tokens)
            .oneshot(
                HttpRequest::get("/who")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");
    }
}
