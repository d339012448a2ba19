//! Item API endpoints.

use axum::{
    extract::{Path, State},
    http::{header::LAST_MODIFIED, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{aliment_response, http_date, parse_http_date, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{AlimentPayload, DeletedAliment};
use crate::realtime::EventKind;
use crate::AppState;

/// GET /Aliment - List all items, answering 304 when the client copy is current.
pub async fn list_aliments(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let client_copy = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    // Header dates carry whole seconds, the same as the marker.
    if let (Some(client_copy), Some(marker)) = (client_copy, state.aliments.last_update()) {
        if marker.timestamp() <= client_copy.timestamp() {
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let aliments = state.aliments.list().await;
    let marker = state.aliments.mark_listed();
    Ok(([(LAST_MODIFIED, http_date(marker))], Json(aliments)).into_response())
}

/// GET /Aliment/{name} - Get a single item.
pub async fn get_aliment(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    match state.aliments.get(&name).await {
        Some(aliment) => Ok(aliment_response(StatusCode::OK, &aliment)),
        None => Err(AppError::NotFound("Aliment not found".to_string())),
    }
}

/// POST /Aliment - Create an item.
pub async fn create_aliment(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<AlimentPayload>,
) -> ApiResult {
    let Some(new) = payload.into_new() else {
        return Err(AppError::Validation("Some field is missing".to_string()));
    };

    let name = new.name.clone();
    let aliment = state
        .aliments
        .create(new)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Aliment {} already exists", name)))?;

    state.notifier.publish(EventKind::AlimentCreated, &aliment);
    Ok(aliment_response(StatusCode::CREATED, &aliment))
}

/// PUT /Aliment/{name} - Update an existing item.
pub async fn update_aliment(
    State(state): State<AppState>,
    Path(name): Path<String>,
    JsonBody(payload): JsonBody<AlimentPayload>,
) -> ApiResult {
    match payload.name() {
        Some(body_name) if body_name != name => {
            return Err(AppError::Validation(
                "Param name and body name should be the same".to_string(),
            ));
        }
        Some(_) => {}
        None => return Err(AppError::Validation("Name is missing".to_string())),
    }

    let aliment = state
        .aliments
        .update(&name, &payload.changes())
        .await?
        .ok_or_else(|| AppError::NoLongerExists("Aliment no longer exists".to_string()))?;

    state.notifier.publish(EventKind::AlimentUpdated, &aliment);
    Ok(aliment_response(StatusCode::OK, &aliment))
}

/// DELETE /Aliment/{name} - Delete an item. Succeeds whether or not it existed.
pub async fn delete_aliment(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let removed = state.aliments.remove(&name).await?;
    if removed.is_none() {
        tracing::debug!("Delete of unknown aliment {}", name);
    }

    state.notifier.publish(
        EventKind::AlimentDeleted,
        &DeletedAliment {
            id: removed.map(|a| a.id),
            name,
        },
    );
    Ok(StatusCode::NO_CONTENT.into_response())
}
