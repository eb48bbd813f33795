//! Fixtures shared by the service unit tests.

use std::sync::Arc;

use axum::http::{header::COOKIE, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

use super::authenticator::Authenticator;
use super::jwt::tests::jwt_config;
use super::jwt::{Identity, JwtService};
use super::store::{ExpenseStore, MockStore};
use crate::middleware::session::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::middleware::{CookiePolicy, Session};
use crate::models::{Category, Role, User};
use crate::utils::hash_password;

pub(crate) fn jwt() -> JwtService {
    JwtService::new(&jwt_config())
}

pub(crate) fn store() -> Arc<MockStore> {
    Arc::new(MockStore::new())
}

/// A session as extracted from a request carrying the given cookies.
pub(crate) fn session_with(access: Option<&str>, refresh: Option<&str>) -> Session {
    let cookie = [(ACCESS_COOKIE, access), (REFRESH_COOKIE, refresh)]
        .iter()
        .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
        .collect::<Vec<_>>()
        .join("; ");

    let mut headers = HeaderMap::new();
    if !cookie.is_empty() {
        headers.insert(COOKIE, cookie.parse().unwrap());
    }

    Session::new(
        CookieJar::from_headers(&headers),
        Authenticator::new(jwt()),
        CookiePolicy {
            path: "/api".to_string(),
            domain: None,
        },
    )
}

pub(crate) fn anonymous() -> Session {
    session_with(None, None)
}

/// A session holding a fresh token pair for `user`.
pub(crate) fn logged_in(user: &User) -> Session {
    let identity = Identity::from(user);
    let access = jwt().sign_access(&identity).unwrap();
    let refresh = jwt().sign_refresh(&identity).unwrap();
    session_with(Some(&access), Some(&refresh))
}

/// A session whose access token has expired but whose refresh token is valid.
pub(crate) fn stale(user: &User) -> Session {
    let identity = Identity::from(user);
    let access = jwt()
        .sign(&identity, chrono::Duration::seconds(-30))
        .unwrap();
    let refresh = jwt().sign_refresh(&identity).unwrap();
    session_with(Some(&access), Some(&refresh))
}

/// Inserts `<username>@example.com` with password `secret`.
pub(crate) async fn seed_user(store: &MockStore, username: &str, role: Role) -> User {
    let user = User::new(
        username.to_string(),
        format!("{}@example.com", username),
        hash_password("secret").unwrap(),
        role,
    );
    store.insert_user(&user).await.unwrap();
    user
}

pub(crate) async fn seed_category(store: &MockStore, category_type: &str, color: &str) -> Category {
    let category = Category::new(category_type.to_string(), color.to_string());
    store.insert_category(&category).await.unwrap();
    category
}
