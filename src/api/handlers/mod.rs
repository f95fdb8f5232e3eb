use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::db::{is_duplicate_id, Database};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side; clients only see a generic message.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Rejected payloads are safe to echo back.
fn validation_error(e: ValidationError) -> (StatusCode, String) {
    tracing::warn!("Validation error: {}", e);
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn note_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Note not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Notes
// ============================================================

pub async fn list_notes(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Vec<Note>>, (StatusCode, String)> {
    db.get_notes(&owner).map(Json).map_err(internal_error)
}

pub async fn create_note(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
    Json(input): Json<CreateNoteInput>,
) -> Result<(StatusCode, Json<Note>), (StatusCode, String)> {
    input.validate().map_err(validation_error)?;

    let note = db.create_note(&owner, input).map_err(|e| {
        if is_duplicate_id(&e) {
            tracing::warn!("Duplicate note id");
            (StatusCode::CONFLICT, "Note id already exists".to_string())
        } else {
            internal_error(e)
        }
    })?;
    tracing::debug!(note_id = %note.id, owner = %owner, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<String>,
    Json(input): Json<UpdateNoteInput>,
) -> Result<Json<Note>, (StatusCode, String)> {
    input.validate().map_err(validation_error)?;

    db.update_note(&owner, &id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(note_not_found)
}

pub async fn trash_note(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<Note>, (StatusCode, String)> {
    db.trash_note(&owner, &id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(note_not_found)
}

pub async fn delete_trashed_note(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db.delete_trashed_note(&owner, &id).map_err(internal_error)? {
        tracing::debug!(note_id = %id, owner = %owner, "trashed note deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Trashed note not found".to_string()))
    }
}

pub async fn empty_trash(
    State(db): State<Database>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<DeletedCount>, (StatusCode, String)> {
    let count = db.delete_all_trashed(&owner).map_err(internal_error)?;
    tracing::debug!(owner = %owner, count, "trash emptied");
    Ok(Json(DeletedCount { count }))
}
