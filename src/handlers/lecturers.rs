use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};

use crate::{
    audit,
    error::Result,
    models::{lecturer::Lecturer, principal::Principal},
    respond,
    state::AppState,
    validation::records::validate_lecturer,
};

pub async fn create_lecturer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(lecturer): Json<Lecturer>,
) -> Result<Response> {
    validate_lecturer(&lecturer)?;
    let created = state.lecturers.create(lecturer).await?;

    if let Some(id) = &created.id {
        tracing::info!("✅ Lecturer created: {}", id);
        audit::record(&state.tasks, &principal, "lecturer.create", format!("lecturer:{}", id));
    }
    respond::json(StatusCode::CREATED, &created)
}

/// Reads a lecturer. Ids are object ids; anything else is rejected with 400.
pub async fn get_lecturer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let read = state.lecturers.read(&id).await?;
    Ok(respond::cached(read))
}

pub async fn update_lecturer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(lecturer): Json<Lecturer>,
) -> Result<Response> {
    validate_lecturer(&lecturer)?;
    let updated = state.lecturers.write(&id, lecturer).await?;

    audit::record(&state.tasks, &principal, "lecturer.update", format!("lecturer:{}", id));
    respond::json(StatusCode::OK, &updated)
}

pub async fn delete_lecturer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response> {
    state.lecturers.invalidate(&id).await?;

    audit::record(&state.tasks, &principal, "lecturer.delete", format!("lecturer:{}", id));
    respond::json(
        StatusCode::OK,
        &sonic_rs::json!({ "success": true, "message": "Lecturer deleted" }),
    )
}
