//! Test helpers for expense-service integration tests.
//!
//! Builds the full router over an in-memory store and drives it with
//! `tower::ServiceExt::oneshot`, so no database or socket is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use expense_service::{
    build_router,
    config::{
        CookieConfig, ExpenseConfig, JwtConfig, RateLimitConfig, SecurityConfig, StoreBackend,
        StoreConfig,
    },
    services::MockStore,
    AppState,
};
use serde_json::{json, Value};
use service_core::config::{Config, Environment};
use tower::util::ServiceExt;

pub const PASSWORD: &str = "secret";

pub fn test_config() -> ExpenseConfig {
    ExpenseConfig {
        common: Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "expense-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            mongodb: None,
        },
        jwt: JwtConfig {
            access_key: "integration-test-key".to_string(),
            access_token_expiry_minutes: 60,
            refresh_token_expiry_days: 7,
        },
        cookies: CookieConfig {
            path: "/api".to_string(),
            domain: None,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
        },
    }
}

/// Response with the parts the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of a cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.set_cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .and_then(|c| c.split(';').next())
            .map(str::to_string)
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// Cookie header value carrying a token pair, as a browser would send it.
pub struct Tokens(pub String);

impl Tokens {
    pub fn new(access: &str, refresh: &str) -> Self {
        Tokens(format!("accessToken={}; refreshToken={}", access, refresh))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MockStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ExpenseConfig) -> Self {
        let store = Arc::new(MockStore::new());
        let state = AppState::new(config, store.clone());
        let router = build_router(state.clone());
        Self {
            router,
            store,
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        tokens: Option<&Tokens>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(Tokens(cookie)) = tokens {
            builder = builder.header(header::COOKIE, cookie.as_str());
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            set_cookies,
            body,
        }
    }

    pub async fn get(&self, uri: &str, tokens: Option<&Tokens>) -> TestResponse {
        self.request(Method::GET, uri, tokens, None).await
    }

    pub async fn post(&self, uri: &str, tokens: Option<&Tokens>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, tokens, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, tokens: Option<&Tokens>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, tokens, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, tokens: Option<&Tokens>, body: Value) -> TestResponse {
        self.request(Method::DELETE, uri, tokens, Some(body)).await
    }

    /// Registers a regular user `{username}@example.com`.
    pub async fn register(&self, username: &str) {
        let res = self
            .post(
                "/api/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    }

    pub async fn register_admin(&self, username: &str) {
        let res = self
            .post(
                "/api/admin",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    }

    pub async fn login(&self, username: &str) -> Tokens {
        let res = self
            .post(
                "/api/login",
                None,
                json!({
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
        Tokens::new(
            res.body["data"]["accessToken"].as_str().unwrap(),
            res.body["data"]["refreshToken"].as_str().unwrap(),
        )
    }

    pub async fn create_category(&self, admin: &Tokens, category_type: &str, color: &str) {
        let res = self
            .post(
                "/api/categories",
                Some(admin),
                json!({ "type": category_type, "color": color }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    }

    pub async fn spend(&self, tokens: &Tokens, username: &str, category_type: &str, amount: Value) -> TestResponse {
        self.post(
            &format!("/api/users/{}/transactions", username),
            Some(tokens),
            json!({ "username": username, "type": category_type, "amount": amount }),
        )
        .await
    }
}
