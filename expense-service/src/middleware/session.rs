//! Per-request carrier of the cookie token pair.
//!
//! [`Session`] is extracted from the request cookies, runs authorization
//! checks through the [`Authenticator`], applies the cookie side effects of
//! a refresh or a login, and finally renders the `{data}` / `{error}`
//! envelope together with the updated cookie jar.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use service_core::error::AppError;

use crate::config::CookieConfig;
use crate::services::authenticator::{AuthOutcome, Authenticator, Requirement};
use crate::services::metrics::record_auth_decision;
use crate::services::ServiceError;
use crate::AppState;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

pub const REFRESHED_TOKEN_MESSAGE: &str =
    "Access token has been refreshed. Remember to copy the new one in the headers of subsequent calls";

/// Attributes shared by both token cookies.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub path: String,
    pub domain: Option<String>,
}

impl From<&CookieConfig> for CookiePolicy {
    fn from(config: &CookieConfig) -> Self {
        Self {
            path: config.path.clone(),
            domain: config.domain.clone(),
        }
    }
}

impl CookiePolicy {
    fn build(&self, name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .http_only(true)
            .path(self.path.clone())
            .max_age(time::Duration::seconds(max_age_seconds))
            .same_site(SameSite::None)
            .secure(true);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

#[derive(Serialize)]
struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(
        rename = "refreshedTokenMessage",
        skip_serializing_if = "Option::is_none"
    )]
    refreshed_token_message: Option<&'static str>,
}

pub struct Session {
    jar: CookieJar,
    authenticator: Authenticator,
    cookies: CookiePolicy,
    refreshed: bool,
}

impl Session {
    pub fn new(jar: CookieJar, authenticator: Authenticator, cookies: CookiePolicy) -> Self {
        Self {
            jar,
            authenticator,
            cookies,
            refreshed: false,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.jar.get(ACCESS_COOKIE).map(|c| c.value().to_string())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Whether an access token was re-issued during this request.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed
    }

    /// Runs the decision procedure against the request cookies. A refreshed
    /// access token replaces the `accessToken` cookie of the response.
    pub fn authorize(&mut self, requirement: &Requirement) -> Result<AuthOutcome, ServiceError> {
        let access = self.access_token();
        let refresh = self.refresh_token();
        let outcome =
            self.authenticator
                .authorize(access.as_deref(), refresh.as_deref(), requirement)?;

        if let Some(token) = &outcome.refreshed_access_token {
            let max_age = self.authenticator.jwt().access_ttl().num_seconds();
            self.add(self.cookies.build(ACCESS_COOKIE, token.clone(), max_age));
            self.refreshed = true;
            record_auth_decision(requirement.kind(), "refreshed");
        } else if outcome.authorized {
            record_auth_decision(requirement.kind(), "authorized");
        } else {
            tracing::debug!(
                requirement = requirement.kind(),
                reason = %outcome.reason,
                "Authorization denied"
            );
            record_auth_decision(requirement.kind(), "denied");
        }

        Ok(outcome)
    }

    /// Fails with `Unauthorized(reason)` unless `requirement` is met.
    pub fn require(&mut self, requirement: &Requirement) -> Result<(), ServiceError> {
        let outcome = self.authorize(requirement)?;
        if outcome.authorized {
            Ok(())
        } else {
            Err(ServiceError::unauthorized(outcome.reason))
        }
    }

    /// Tries each requirement in turn; the reason of the last denial is
    /// reported when none is met.
    pub fn require_any(&mut self, requirements: &[Requirement]) -> Result<(), ServiceError> {
        let mut reason = String::from("Unauthorized");
        for requirement in requirements {
            let outcome = self.authorize(requirement)?;
            if outcome.authorized {
                return Ok(());
            }
            reason = outcome.reason;
        }
        Err(ServiceError::unauthorized(reason))
    }

    pub fn set_tokens(&mut self, access: &str, refresh: &str) {
        let jwt = self.authenticator.jwt();
        let access_age = jwt.access_ttl().num_seconds();
        let refresh_age = jwt.refresh_ttl().num_seconds();
        self.add(self.cookies.build(ACCESS_COOKIE, access.to_string(), access_age));
        self.add(self.cookies.build(REFRESH_COOKIE, refresh.to_string(), refresh_age));
    }

    pub fn clear_tokens(&mut self) {
        self.add(self.cookies.build(ACCESS_COOKIE, String::new(), 0));
        self.add(self.cookies.build(REFRESH_COOKIE, String::new(), 0));
    }

    fn add(&mut self, cookie: Cookie<'static>) {
        self.jar = self.jar.clone().add(cookie);
    }

    /// Renders the outcome of an operation with the session cookies.
    pub fn reply<T, E>(self, result: Result<T, E>) -> Response
    where
        T: Serialize,
        E: Into<AppError>,
    {
        let refreshed_token_message = self.refreshed.then_some(REFRESHED_TOKEN_MESSAGE);

        let (status, envelope) = match result {
            Ok(data) => (
                StatusCode::OK,
                Envelope {
                    data: Some(data),
                    error: None,
                    refreshed_token_message,
                },
            ),
            Err(err) => {
                let err: AppError = err.into();
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (
                    status,
                    Envelope {
                        data: None,
                        error: Some(err.message()),
                        refreshed_token_message,
                    },
                )
            }
        };

        (status, self.jar, Json(envelope)).into_response()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session::new(
            CookieJar::from_headers(&parts.headers),
            state.authenticator.clone(),
            state.cookies.clone(),
        ))
    }
}
