use std::time::Duration;

use axum::{
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post, put},
    Router,
};
use http::{header, HeaderValue, Method, StatusCode};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers, middleware_layer,
    respond::{self, CACHE_STATUS_HEADER},
    state::AppState,
};

async fn health() -> Response {
    respond::json_response(StatusCode::OK, r#"{"status":"ok"}"#)
}

/// Builds the HTTP router.
///
/// Reads and the auth endpoints are open; every mutation sits behind the
/// access-token gate.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .expose_headers([header::HeaderName::from_static(CACHE_STATUS_HEADER)])
        .max_age(Duration::from_secs(86400));

    let open_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/students/{id}", get(handlers::students::get_student))
        .route("/lecturers/{id}", get(handlers::lecturers::get_lecturer))
        .route("/libraries/{id}", get(handlers::libraries::get_library))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/students", post(handlers::students::create_student))
        .route(
            "/students/{id}",
            put(handlers::students::update_student)
                .delete(handlers::students::delete_student),
        )
        .route("/lecturers", post(handlers::lecturers::create_lecturer))
        .route(
            "/lecturers/{id}",
            put(handlers::lecturers::update_lecturer)
                .delete(handlers::lecturers::delete_lecturer),
        )
        .route("/libraries", post(handlers::libraries::create_library))
        .route("/libraries/borrow", post(handlers::libraries::borrow_book))
        .route("/libraries/return", post(handlers::libraries::return_book))
        .route(
            "/libraries/{id}",
            put(handlers::libraries::update_library)
                .delete(handlers::libraries::delete_library),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(open_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors)
}
