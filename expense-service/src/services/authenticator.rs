//! Verify-and-refresh decision procedure for the cookie token pair.
//!
//! Every protected operation asks [`Authenticator::authorize`] whether the
//! caller's tokens satisfy a [`Requirement`]. An expired access token is
//! transparently replaced when the refresh token is still valid and
//! satisfies the requirement on its own; the caller is responsible for
//! shipping the new token back to the client.

use std::collections::HashSet;

use super::error::ServiceError;
use super::jwt::{Claims, JwtService, TokenError};

pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any logged-in user.
    Simple,
    /// The caller must be this user.
    User(String),
    Admin,
    /// The caller's email must be one of these.
    Group(HashSet<String>),
}

impl Requirement {
    pub fn group<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::Group(emails.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Requirement::Simple => "simple",
            Requirement::User(_) => "user",
            Requirement::Admin => "admin",
            Requirement::Group(_) => "group",
        }
    }
}

/// Serves either the self-service flavour of an endpoint or its admin twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Member,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub authorized: bool,
    pub reason: String,
    /// Present when the access token was re-issued from the refresh token.
    pub refreshed_access_token: Option<String>,
}

impl AuthOutcome {
    fn allow(reason: &str) -> Self {
        Self {
            authorized: true,
            reason: reason.to_string(),
            refreshed_access_token: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            reason: reason.into(),
            refreshed_access_token: None,
        }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtService,
}

impl Authenticator {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Decides whether the token pair satisfies `requirement`.
    ///
    /// Only minting a refreshed access token can fail; every other outcome,
    /// including denial, is reported through [`AuthOutcome`].
    pub fn authorize(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        requirement: &Requirement,
    ) -> Result<AuthOutcome, ServiceError> {
        let (Some(access), Some(refresh)) = (
            access.filter(|t| !t.is_empty()),
            refresh.filter(|t| !t.is_empty()),
        ) else {
            return Ok(AuthOutcome::deny("Unauthorized"));
        };

        let access_claims = match self.jwt.verify(access) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return self.refresh(refresh, requirement),
            Err(e) => return Ok(AuthOutcome::deny(e.name())),
        };

        let refresh_claims = match self.jwt.verify(refresh) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return self.refresh(refresh, requirement),
            Err(e) => return Ok(AuthOutcome::deny(e.name())),
        };

        if !access_claims.is_complete() || !refresh_claims.is_complete() {
            return Ok(AuthOutcome::deny("Token is missing information"));
        }
        if !access_claims.same_subject(&refresh_claims) {
            return Ok(AuthOutcome::deny("Mismatched users"));
        }

        Ok(check_live(&access_claims, requirement))
    }

    /// Access token expired: judge the refresh token alone and, if it passes,
    /// mint a new access token from its claims.
    fn refresh(&self, refresh: &str, requirement: &Requirement) -> Result<AuthOutcome, ServiceError> {
        let claims = match self.jwt.verify(refresh) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                return Ok(AuthOutcome::deny("Token expired, log-in again"));
            }
            Err(e) => return Ok(AuthOutcome::deny(e.name())),
        };

        if let Some(reason) = check_refresh(&claims, requirement) {
            return Ok(AuthOutcome::deny(reason));
        }

        let token = self.jwt.sign_access(&claims.identity())?;
        tracing::info!(username = %claims.username, "Access token refreshed");

        Ok(AuthOutcome {
            authorized: true,
            reason: "authenticated".to_string(),
            refreshed_access_token: Some(token),
        })
    }
}

fn check_live(claims: &Claims, requirement: &Requirement) -> AuthOutcome {
    match requirement {
        Requirement::Simple => AuthOutcome::allow("authorized"),
        Requirement::User(username) if claims.username == *username => {
            AuthOutcome::allow("authorized")
        }
        Requirement::User(_) => AuthOutcome::deny("Not authorized for action on this user."),
        Requirement::Admin if claims.role == ADMIN_ROLE => AuthOutcome::allow("authorized"),
        Requirement::Group(emails) if emails.contains(&claims.email) => {
            AuthOutcome::allow("authorized")
        }
        Requirement::Admin | Requirement::Group(_) => {
            AuthOutcome::deny("Not authorized for this action")
        }
    }
}

fn check_refresh(claims: &Claims, requirement: &Requirement) -> Option<&'static str> {
    match requirement {
        Requirement::Simple => None,
        Requirement::User(username) => {
            (claims.username != *username).then_some("Not valid token for the request user")
        }
        Requirement::Admin => {
            (claims.role != ADMIN_ROLE).then_some("Not valid token for the request role")
        }
        Requirement::Group(emails) => {
            (!emails.contains(&claims.email)).then_some("Not valid token for the request role")
        }
    }
}
