use std::time::Duration as StdDuration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::{time::Duration, SameSite};
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::{ACCESS_COOKIE, REFRESH_COOKIE},
    services::{
        auth as auth_service,
        token::{TokenError, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL},
    },
    state::AppState,
    validation::auth::validate_login_email,
};

/// The request payload for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The response payload for login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// The response payload for a token refresh.
#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
}

/// The response payload for logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Creates an HttpOnly, SameSite=Strict cookie living for `ttl`.
fn create_secure_cookie(
    name: &'static str,
    value: String,
    ttl: StdDuration,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(Duration::seconds(ttl.as_secs() as i64));
    cookie.set_path("/");
    cookie
}

/// Handles login: checks credentials and sets the access and refresh cookies.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for {}", payload.email);
    validate_login_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let account =
        auth_service::authenticate(state.accounts.as_ref(), &payload.email, &payload.password)
            .await?;

    let pair = state.tokens.issue_pair(&account.email)?;
    let secure = state.config.secure_cookies;

    cookies.add(create_secure_cookie(
        ACCESS_COOKIE,
        pair.access.token,
        ACCESS_TOKEN_TTL,
        secure,
    ));
    cookies.add(create_secure_cookie(
        REFRESH_COOKIE,
        pair.refresh.token,
        REFRESH_TOKEN_TTL,
        secure,
    ));

    tracing::info!("✅ Logged in: {}", account.email);

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        access_expires_at: pair.access.expires_at,
        refresh_expires_at: pair.refresh.expires_at,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles refresh: trades the refresh cookie for a new access token.
///
/// The refresh token is left as it is.
#[axum::debug_handler]
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let refresh_token = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(TokenError::Missing)?;

    let access = state.tokens.refresh(&refresh_token)?;

    cookies.add(create_secure_cookie(
        ACCESS_COOKIE,
        access.token.clone(),
        ACCESS_TOKEN_TTL,
        state.config.secure_cookies,
    ));

    tracing::info!("✅ Access token refreshed");

    let response = RefreshResponse {
        success: true,
        message: "New access token issued".to_string(),
        access_token: access.token,
        access_expires_at: access.expires_at,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles logout: clears the access cookie. The refresh token stays valid
/// until it expires.
#[axum::debug_handler]
pub async fn logout(cookies: Cookies) -> Result<Response> {
    // sent even when the request carried no cookie
    let mut access_cookie = Cookie::new(ACCESS_COOKIE, "");
    access_cookie.set_http_only(true);
    access_cookie.set_max_age(Duration::seconds(0));
    access_cookie.set_path("/");
    cookies.add(access_cookie);

    tracing::info!("👋 Access cookie cleared");

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
