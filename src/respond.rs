use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::cache_aside::CachedRead;

/// Builds a response with a JSON content type around an already-encoded body.
pub fn json_response(status: StatusCode, body: impl Into<Body>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body.into(),
    )
        .into_response()
}

/// Encodes `value` with sonic-rs and wraps it in a JSON response.
pub fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> crate::error::Result<Response> {
    let body = sonic_rs::to_vec(value)?;
    Ok(json_response(status, body))
}

/// Header telling clients whether a read was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Wraps the bytes of a cache-aside read in a 200 response.
pub fn cached(read: CachedRead) -> Response {
    let mut response = json_response(StatusCode::OK, read.bytes);
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(read.origin.as_header()),
    );
    response
}
