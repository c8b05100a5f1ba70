use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};

use crate::{
    audit,
    error::Result,
    models::{
        library::{BorrowRequest, Library},
        principal::Principal,
    },
    repositories::library::{Circulation, LibraryStore},
    respond,
    state::AppState,
    store::with_deadline,
    validation::records::{validate_borrow_user, validate_library},
};

/// Creates a library with its books and authors in one transaction.
pub async fn create_library(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(library): Json<Library>,
) -> Result<Response> {
    validate_library(&library)?;
    let created = state.libraries.create_aggregate(library).await?;

    if let Some(id) = created.library_id {
        tracing::info!(
            "✅ Library created: {} ({} books, {} authors)",
            id,
            created.book.len(),
            created.author.len()
        );
        audit::record(&state.tasks, &principal, "library.create", format!("library:{}", id));
    }
    respond::json(StatusCode::CREATED, &created)
}

pub async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let read = state.libraries.read(&id).await?;
    Ok(respond::cached(read))
}

/// Replaces a library's fields and its books and authors.
pub async fn update_library(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(library): Json<Library>,
) -> Result<Response> {
    validate_library(&library)?;
    let updated = state.libraries.write(&id, library).await?;

    audit::record(&state.tasks, &principal, "library.update", format!("library:{}", id));
    respond::json(StatusCode::OK, &updated)
}

pub async fn delete_library(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response> {
    state.libraries.invalidate(&id).await?;

    audit::record(&state.tasks, &principal, "library.delete", format!("library:{}", id));
    respond::json(
        StatusCode::OK,
        &sonic_rs::json!({ "success": true, "message": "Library deleted" }),
    )
}

/// Runs a circulation change and drops the owning library from the cache,
/// since its copy counts just changed.
async fn circulate<F>(state: &AppState, change: F) -> Result<Circulation>
where
    F: std::future::Future<Output = Result<Circulation>>,
{
    let outcome = with_deadline(state.config.store_write_timeout, change).await?;
    state
        .libraries
        .evict(&outcome.library_id.to_string())
        .await;
    Ok(outcome)
}

pub async fn borrow_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BorrowRequest>,
) -> Result<Response> {
    validate_borrow_user(request.user_id)?;
    let store = state.libraries.store().clone();
    let outcome = circulate(&state, store.borrow(&request)).await?;

    tracing::info!(
        "📚 Book {} borrowed by {} {}",
        request.book_id,
        request.user_type.as_str(),
        request.user_id
    );
    audit::record(
        &state.tasks,
        &principal,
        "library.borrow",
        format!("book:{}", request.book_id),
    );
    respond::json(StatusCode::CREATED, &outcome.record)
}

pub async fn return_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BorrowRequest>,
) -> Result<Response> {
    validate_borrow_user(request.user_id)?;
    let store = state.libraries.store().clone();
    let outcome = circulate(&state, store.return_book(&request)).await?;

    tracing::info!(
        "📚 Book {} returned by {} {}",
        request.book_id,
        request.user_type.as_str(),
        request.user_id
    );
    audit::record(
        &state.tasks,
        &principal,
        "library.return",
        format!("book:{}", request.book_id),
    );
    respond::json(StatusCode::OK, &outcome.record)
}
