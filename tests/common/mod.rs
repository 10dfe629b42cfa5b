//! Common test utilities for E2E tests
//!
//! Every test server talks to a mock identity provider that plays both
//! Google and GitHub, so the whole sign-in flow runs offline.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router, async_trait,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use keyhole::{
    AppState, config,
    session::{MemoryStore, Record, SessionId, SessionStore, StorageError},
};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Authorization code the mock provider accepts
pub const VALID_CODE: &str = "valid-code";

/// Access token the mock provider issues for [`VALID_CODE`]
pub const ACCESS_TOKEN: &str = "mock-access-token";

pub const STYLESHEET: &str = "body { font-family: sans-serif; }\n";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    /// Session store, when the server runs on the default in-memory one
    pub memory: Option<MemoryStore>,
    pub _public_dir: TempDir,
}

impl TestServer {
    /// Create a new test server with an in-memory session store
    pub async fn new() -> Self {
        let memory = MemoryStore::new();
        let mut server = Self::with_store(Arc::new(memory.clone())).await;
        server.memory = Some(memory);
        server
    }

    /// Create a new test server on the given session store
    pub async fn with_store(store: Arc<dyn SessionStore>) -> Self {
        let provider_url = spawn_mock_provider().await;

        let public_dir = TempDir::new().unwrap();
        std::fs::write(public_dir.path().join("style.css"), STYLESHEET).unwrap();

        let config = test_config(&provider_url, public_dir.path().to_path_buf());
        let state = AppState::with_store(config, store).unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = keyhole::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            memory: None,
            _public_dir: public_dir,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// A browser without cookies pointed at this server
    pub fn browser(&self) -> Browser {
        Browser::new(&self.addr)
    }

    /// Number of stored sessions
    pub async fn session_count(&self) -> usize {
        self.memory
            .as_ref()
            .expect("server runs on the in-memory store")
            .len()
            .await
    }
}

/// Configuration with both providers pointed at the mock provider
pub fn test_config(provider_url: &str, public_dir: PathBuf) -> config::AppConfig {
    let provider = |name: &str, profile_path: &str| config::ProviderConfig {
        client_id: format!("{name}-client-id"),
        client_secret: format!("{name}-client-secret"),
        callback_url: format!("http://localhost:3000/auth/{name}/callback"),
        scopes: None,
        authorize_url: Some(format!("{provider_url}/{name}/authorize")),
        token_url: Some(format!("{provider_url}/token")),
        profile_url: Some(format!("{provider_url}{profile_path}")),
    };

    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            public_dir,
        },
        session: config::SessionConfig {
            secret: "test-secret-key-32-bytes-long!!!".to_string(),
            cookie_name: "session".to_string(),
            secure_cookies: false,
            max_age_seconds: None,
        },
        providers: config::ProvidersConfig {
            google: Some(provider("google", "/google/userinfo")),
            github: Some(provider("github", "/github/user")),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

// =============================================================================
// Mock identity provider
// =============================================================================

/// Start the mock provider and return its base URL
pub async fn spawn_mock_provider() -> String {
    let app = Router::new()
        .route("/token", post(mock_token))
        .route("/google/userinfo", get(mock_google_userinfo))
        .route("/github/user", get(mock_github_user))
        .route("/github/user/emails", get(mock_github_emails));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn mock_token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    let valid = form.get("grant_type").map(String::as_str) == Some("authorization_code")
        && form.get("code").map(String::as_str) == Some(VALID_CODE);

    if valid {
        (
            StatusCode::OK,
            Json(json!({
                "access_token": ACCESS_TOKEN,
                "token_type": "bearer",
                // GitHub's format: one comma-separated value
                "scope": "read:user,user:email",
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "The code passed is incorrect or expired.",
            })),
        )
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {ACCESS_TOKEN}").as_str())
}

async fn mock_google_userinfo(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_token" })));
    }

    (
        StatusCode::OK,
        Json(json!({
            "sub": "109876543210",
            "name": "Ada Lovelace",
            "given_name": "Ada",
            "email": "ada@example.com",
            "email_verified": true,
            "picture": "https://example.com/ada.png",
        })),
    )
}

async fn mock_github_user(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": 583231,
            "login": "octocat",
            "name": "The Octocat",
            "email": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
        })),
    )
}

async fn mock_github_emails(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }

    (
        StatusCode::OK,
        Json(json!([
            { "email": "old@example.com", "primary": false, "verified": false },
            { "email": "octocat@github.com", "primary": true, "verified": true },
        ])),
    )
}

// =============================================================================
// Browser
// =============================================================================

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    path: String,
}

/// HTTP client that keeps cookies and never follows redirects
pub struct Browser {
    base: String,
    client: reqwest::Client,
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl Browser {
    pub fn new(base: &str) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build no-redirect client");

        Self {
            base: base.to_string(),
            client,
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// GET `path`, sending matching cookies and keeping the ones set
    pub async fn get(&self, path: &str) -> reqwest::Response {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(cookie) = self.cookie_header(path) {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await.expect("request succeeds");
        for value in response.headers().get_all(header::SET_COOKIE) {
            self.store_cookie(value.to_str().expect("ascii set-cookie"));
        }
        response
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .unwrap()
            .get(name)
            .map(|cookie| cookie.value.clone())
    }

    pub fn set_cookie(&self, name: &str, value: &str, path: &str) {
        self.cookies.lock().unwrap().insert(
            name.to_string(),
            StoredCookie {
                value: value.to_string(),
                path: path.to_string(),
            },
        );
    }

    fn cookie_header(&self, path: &str) -> Option<String> {
        let cookies = self.cookies.lock().unwrap();
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|(_, cookie)| path.starts_with(&cookie.path))
            .map(|(name, cookie)| format!("{name}={}", cookie.value))
            .collect();

        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    fn store_cookie(&self, header: &str) {
        let mut parts = header.split(';').map(str::trim);
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };

        let mut path = "/".to_string();
        let mut expired = value.is_empty();
        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            if key.eq_ignore_ascii_case("path") {
                path = val.to_string();
            } else if key.eq_ignore_ascii_case("max-age") && val.trim() == "0" {
                expired = true;
            }
        }

        let mut cookies = self.cookies.lock().unwrap();
        if expired {
            cookies.remove(name);
        } else {
            cookies.insert(
                name.to_string(),
                StoredCookie {
                    value: value.to_string(),
                    path,
                },
            );
        }
    }
}

/// `Location` header of a response
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Value of a query parameter in an absolute URL
pub fn query_param(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .expect("absolute url")
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Whether a response sets the named cookie to a non-empty value
pub fn sets_cookie(response: &reqwest::Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix) && !value.starts_with(&format!("{prefix};")))
}

/// Walk the browser through a complete sign-in with `provider`
///
/// Returns the response of the callback request.
pub async fn sign_in(browser: &Browser, provider: &str) -> reqwest::Response {
    let response = browser.get(&format!("/auth/{provider}")).await;
    assert_eq!(response.status(), 302);
    let state = query_param(&location(&response), "state").expect("state parameter");

    browser
        .get(&format!(
            "/auth/{provider}/callback?code={VALID_CODE}&state={state}"
        ))
        .await
}

// =============================================================================
// Failing store
// =============================================================================

/// In-memory store whose deletes always fail
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Record>, StorageError> {
        self.inner.load(id).await
    }

    async fn save(&self, id: &SessionId, record: &Record) -> Result<(), StorageError> {
        self.inner.save(id, record).await
    }

    async fn delete(&self, _id: &SessionId) -> Result<(), StorageError> {
        Err(StorageError::Backend("store is read-only".to_string()))
    }
}
