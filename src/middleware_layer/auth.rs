use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::principal::Principal,
    services::token::TokenError,
    state::AppState,
};

/// The cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// The cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Extracts the access token from the cookie, falling back to an
/// `Authorization: Bearer` header.
fn extract_access_token(cookies: &Cookies, headers: &HeaderMap) -> Option<String> {
    // an emptied cookie (e.g. after logout) does not shadow the header
    if let Some(cookie) = cookies.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid access token.
///
/// On success the caller's `Principal` is added to the request extensions.
/// Any failure answers 401 without reaching the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = extract_access_token(&cookies, request.headers()) else {
        tracing::warn!("❌ No access token presented");
        return AppError::from(TokenError::Missing).into_response();
    };

    let claims = match state.tokens.authorize(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("❌ Access token rejected: {}", e);
            return AppError::from(e).into_response();
        }
    };

    tracing::debug!("✅ Authenticated: {}", claims.sub);

    request.extensions_mut().insert(Principal {
        expires_at: claims.expires_at(),
        subject: claims.sub,
    });

    next.run(request).await
}
