use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use zeroize::Zeroizing;

use campus_records::{
    cache::memory::MemoryCache,
    config::{BootstrapAdmin, Config},
    repositories::memory::{MemoryAccountStore, MemoryLibraryStore, MemoryStore},
    routes,
    services::{
        auth as auth_service,
        token::{FixedClock, TokenKind, TokenService},
    },
    state::{AppState, Stores},
};

const SECRET: &[u8] = b"integration-secret-that-is-long-enough";
const ADMIN_EMAIL: &str = "akash@gmail.com";
const ADMIN_PASSWORD: &str = "correct horse battery";

// Shared test context
struct TestContext {
    app: Router,
    state: AppState,
    cache: MemoryCache,
    now: i64,
}

impl TestContext {
    async fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        let cache = MemoryCache::new();
        let accounts = Arc::new(MemoryAccountStore::new());

        let admin = BootstrapAdmin {
            email: ADMIN_EMAIL.to_string(),
            password: Zeroizing::new(ADMIN_PASSWORD.to_string()),
        };
        auth_service::ensure_bootstrap_account(accounts.as_ref(), &admin)
            .await
            .unwrap();

        let stores = Stores {
            students: Arc::new(MemoryStore::serial()),
            lecturers: Arc::new(MemoryStore::object_id()),
            libraries: Arc::new(MemoryLibraryStore::new()),
            accounts,
        };
        let state = AppState::from_parts(
            Config::new("postgres://unused", SECRET),
            stores,
            Arc::new(cache.clone()),
            Arc::new(FixedClock(now)),
        );

        Self {
            app: routes::router(state.clone()),
            state,
            cache,
            now,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self) -> (String, String) {
        let response = self
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let access = cookie_value(&response, "access_token").expect("access cookie");
        let refresh = cookie_value(&response, "refresh_token").expect("refresh cookie");
        (access, refresh)
    }
}

fn json_request(method: &str, uri: &str, cookie: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
        .and_then(|c| {
            c.split(';')
                .next()
                .map(|pair| pair[prefix.len()..].to_string())
        })
}

fn cache_status(response: &Response) -> Option<&str> {
    response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_sets_session_cookies() {
        let context = TestContext::new().await;

        let response = context
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let access = cookies
            .iter()
            .find(|c| c.starts_with("access_token="))
            .unwrap();
        let refresh = cookies
            .iter()
            .find(|c| c.starts_with("refresh_token="))
            .unwrap();

        for cookie in [access, refresh] {
            assert!(cookie.contains("HttpOnly"));
            assert!(cookie.contains("SameSite=Strict"));
            assert!(cookie.contains("Path=/"));
            assert!(!cookie.contains("Secure"));
        }
        assert!(access.contains("Max-Age=900"));
        assert!(refresh.contains("Max-Age=604800"));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_rejected() {
        let context = TestContext::new().await;

        let wrong_password = context
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": "not the password" }),
            ))
            .await;
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&wrong_password).is_empty());

        let unknown = context
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": "nobody@gmail.com", "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(body_json(wrong_password).await, body_json(unknown).await);
    }

    #[tokio::test]
    async fn test_student_crud_through_the_cache() {
        let context = TestContext::new().await;
        let (access, _) = context.login().await;
        let auth = Some(format!("access_token={}", access));

        // Step 1: Create
        let created = context
            .send(json_request(
                "POST",
                "/students",
                auth.clone(),
                json!({ "name": "Ada", "age": 20, "email": "ada@gmail.com", "dept": "CS" }),
            ))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(body_json(created).await["id"], 1);
        context.state.tasks.settle().await;

        // Step 2: Read is served from the cache
        let read = context.send(get_request("/students/1")).await;
        assert_eq!(read.status(), StatusCode::OK);
        assert_eq!(cache_status(&read), Some("hit"));
        assert_eq!(body_json(read).await["name"], "Ada");

        // Step 3: Update, then read the new value
        let updated = context
            .send(json_request(
                "PUT",
                "/students/1",
                auth.clone(),
                json!({ "name": "Ada L.", "age": 21, "email": "ada@gmail.com", "dept": "CS" }),
            ))
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        context.state.tasks.settle().await;

        let read = context.send(get_request("/students/1")).await;
        assert_eq!(body_json(read).await["name"], "Ada L.");

        // Step 4: Cache dropped behind our back, the read heals it
        context.cache.clear().await;
        let read = context.send(get_request("/students/1")).await;
        assert_eq!(cache_status(&read), Some("miss"));
        context.state.tasks.settle().await;
        assert!(context.cache.contains("student:1").await);

        // Step 5: Delete
        let deleted = context
            .send(
                Request::builder()
                    .method("DELETE")
                    .uri("/students/1")
                    .header(header::COOKIE, auth.clone().unwrap())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(deleted.status(), StatusCode::OK);
        assert!(!context.cache.contains("student:1").await);

        let gone = context.send(get_request("/students/1")).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_records_are_rejected() {
        let context = TestContext::new().await;
        let (access, _) = context.login().await;

        let response = context
            .send(json_request(
                "POST",
                "/students",
                Some(format!("access_token={}", access)),
                json!({ "name": "Ada", "age": 120, "email": "ada@yahoo.com", "dept": "CS" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(context.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_gate_rejects_missing_wrong_kind_and_tampered_tokens() {
        let context = TestContext::new().await;
        let (access, refresh) = context.login().await;
        let body = json!({ "name": "Ada", "age": 20, "email": "ada@gmail.com", "dept": "CS" });

        // no token at all
        let response = context
            .send(json_request("POST", "/students", None, body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "invalid_token");

        // refresh token presented as access token
        let response = context
            .send(json_request(
                "POST",
                "/students",
                Some(format!("access_token={}", refresh)),
                body.clone(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "invalid_token");

        // tampered payload
        let mut parts: Vec<String> = access.split('.').map(str::to_string).collect();
        parts[1] = format!("{}x", parts[1]);
        let response = context
            .send(json_request(
                "POST",
                "/students",
                Some(format!("access_token={}", parts.join("."))),
                body.clone(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // nothing reached the store
        assert_eq!(
            context.send(get_request("/students/1")).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_expired_access_token_asks_for_refresh() {
        let context = TestContext::new().await;

        let issued_earlier = TokenService::new(SECRET, Arc::new(FixedClock(context.now - 16 * 60)))
            .issue(ADMIN_EMAIL, TokenKind::Access)
            .unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/lecturers")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", issued_earlier.token))
            .body(Body::from(
                json!({ "name": "Grace", "age": 45, "email": "grace@gmail.com", "designation": "Professor" })
                    .to_string(),
            ))
            .unwrap();
        let response = context.send(request).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "token_expired");
    }

    #[tokio::test]
    async fn test_empty_access_cookie_falls_back_to_bearer() {
        let context = TestContext::new().await;
        let (access, _) = context.login().await;

        // Step 1: a cleared cookie rides along with a valid header
        let request = Request::builder()
            .method("POST")
            .uri("/lecturers")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, "access_token=")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .body(Body::from(
                json!({ "name": "Grace", "age": 45, "email": "grace@gmail.com", "designation": "Professor" })
                    .to_string(),
            ))
            .unwrap();
        let response = context.send(request).await;

        // Step 2: the header wins
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_refresh_then_logout() {
        let context = TestContext::new().await;
        let (_, refresh) = context.login().await;

        // Step 1: Refresh without a cookie
        let response = context
            .send(json_request("POST", "/auth/refresh", None, json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Step 2: Refresh with the refresh cookie
        let response = context
            .send(json_request(
                "POST",
                "/auth/refresh",
                Some(format!("refresh_token={}", refresh)),
                json!({}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_value(&response, "access_token").is_some());
        assert!(cookie_value(&response, "refresh_token").is_none());
        let new_access = body_json(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        // Step 3: The new access token works as a bearer token
        let request = Request::builder()
            .method("POST")
            .uri("/lecturers")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", new_access))
            .body(Body::from(
                json!({ "name": "Grace", "age": 45, "email": "grace@gmail.com", "designation": "Professor" })
                    .to_string(),
            ))
            .unwrap();
        let response = context.send(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 32);

        // Step 4: Logout clears only the access cookie
        let response = context
            .send(json_request("POST", "/auth/logout", None, json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=") && c.contains("Max-Age=0")));
        assert!(!cookies.iter().any(|c| c.starts_with("refresh_token=")));

        // the refresh token is still good after logout
        let response = context
            .send(json_request(
                "POST",
                "/auth/refresh",
                Some(format!("refresh_token={}", refresh)),
                json!({}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_library_borrow_and_return_refresh_the_cached_library() {
        let context = TestContext::new().await;
        let (access, _) = context.login().await;
        let auth = Some(format!("access_token={}", access));

        // Step 1: Create a library with one book, two copies
        let response = context
            .send(json_request(
                "POST",
                "/libraries",
                auth.clone(),
                json!({
                    "title": "Central",
                    "available_copies": 2,
                    "book": [{ "book_id": 10, "book_name": "Gitanjali", "available_copies": 2 }],
                    "author": [{ "author_id": 1, "author_name": "Tagore" }]
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["library_id"], 1);
        assert!(context.cache.contains("library:1").await);

        // Step 2: Borrow a copy
        let borrow = json!({ "user_id": 1, "user_type": "student", "book_id": 10 });
        let response = context
            .send(json_request("POST", "/libraries/borrow", auth.clone(), borrow.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_json(response).await["return_date"].is_null());
        assert!(!context.cache.contains("library:1").await);

        let read = context.send(get_request("/libraries/1")).await;
        assert_eq!(cache_status(&read), Some("miss"));
        assert_eq!(body_json(read).await["book"][0]["available_copies"], 1);

        // Step 3: Return it
        let response = context
            .send(json_request("POST", "/libraries/return", auth.clone(), borrow.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!body_json(response).await["return_date"].is_null());

        let read = context.send(get_request("/libraries/1")).await;
        assert_eq!(body_json(read).await["book"][0]["available_copies"], 2);

        // Step 4: Nothing left to return
        let response = context
            .send(json_request("POST", "/libraries/return", auth, borrow))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let context = TestContext::new().await;
        let response = context.send(get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
