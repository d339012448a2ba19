//! Account API endpoints.

use axum::{
    extract::State,
    http::{header::ETAG, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use super::{ApiResult, JsonBody};
use crate::auth::Claims;
use crate::errors::AppError;
use crate::models::{Credentials, PublicUser, TokenResponse, User};
use crate::realtime::EventKind;
use crate::AppState;

const MISSING_CREDENTIALS: &str = "Both username and password must be set";

/// POST /api/signup - Create an account and return a token for it.
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> ApiResult {
    let (username, password) = credentials
        .into_parts()
        .ok_or_else(|| AppError::Validation(MISSING_CREDENTIALS.to_string()))?;

    let user = state
        .users
        .create(&username, &password)
        .await?
        .ok_or_else(|| AppError::Conflict("Username already taken".to_string()))?;

    tracing::info!(username = %user.username, "User signed up");
    state
        .notifier
        .publish(EventKind::UserCreated, &PublicUser::from(&user));
    Ok(token_response(&state, StatusCode::CREATED, &user))
}

/// POST /api/auth/session - Exchange credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> ApiResult {
    let (username, password) = credentials
        .into_parts()
        .ok_or_else(|| AppError::Validation(MISSING_CREDENTIALS.to_string()))?;

    let user = state
        .users
        .authenticate(&username, &password)
        .await
        .ok_or(AppError::WrongCredentials)?;

    Ok(token_response(&state, state.config.login_status, &user))
}

/// GET /api/auth/session - The account behind the presented bearer token.
pub async fn current_session(Extension(claims): Extension<Claims>) -> Json<PublicUser> {
    Json(PublicUser {
        username: claims.username,
        id: claims.id,
    })
}

fn token_response(state: &AppState, status: StatusCode, user: &User) -> Response {
    let token = state.tokens.issue(user);
    let mut response = (status, Json(TokenResponse { token })).into_response();
    if let Ok(etag) = HeaderValue::from_str(&user.username) {
        response.headers_mut().insert(ETAG, etag);
    }
    response
}
