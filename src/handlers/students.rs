use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};

use crate::{
    audit,
    error::Result,
    models::{principal::Principal, student::Student},
    respond,
    state::AppState,
    validation::records::validate_student,
};

pub async fn create_student(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(student): Json<Student>,
) -> Result<Response> {
    validate_student(&student)?;
    let created = state.students.create(student).await?;

    if let Some(id) = created.id {
        tracing::info!("✅ Student created: {}", id);
        audit::record(&state.tasks, &principal, "student.create", format!("student:{}", id));
    }
    respond::json(StatusCode::CREATED, &created)
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let read = state.students.read(&id).await?;
    Ok(respond::cached(read))
}

pub async fn update_student(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(student): Json<Student>,
) -> Result<Response> {
    validate_student(&student)?;
    let updated = state.students.write(&id, student).await?;

    audit::record(&state.tasks, &principal, "student.update", format!("student:{}", id));
    respond::json(StatusCode::OK, &updated)
}

pub async fn delete_student(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response> {
    state.students.invalidate(&id).await?;

    audit::record(&state.tasks, &principal, "student.delete", format!("student:{}", id));
    respond::json(
        StatusCode::OK,
        &sonic_rs::json!({ "success": true, "message": "Student deleted" }),
    )
}
