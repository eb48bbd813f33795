use std::sync::Arc;

use validator::Validate;

use super::authenticator::Requirement;
use super::error::ServiceError;
use super::jwt::Identity;
use super::store::ExpenseStore;
use crate::dtos::auth::{LoginRequest, MessageResponse, TokenPair};
use crate::dtos::non_blank;
use crate::middleware::Session;
use crate::utils::{is_valid_email, verify_password};

/// Issues and revokes the cookie token pair.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn ExpenseStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    pub async fn login(
        &self,
        session: &mut Session,
        req: LoginRequest,
    ) -> Result<TokenPair, ServiceError> {
        req.validate()
            .map_err(|_| ServiceError::validation("Body error"))?;
        let (Some(email), Some(password)) = (non_blank(req.email), non_blank(req.password)) else {
            return Err(ServiceError::validation("Body error"));
        };
        if !is_valid_email(&email) {
            return Err(ServiceError::validation("Not a valid formatted email"));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found, please register"))?;

        // A request that already carries a valid session for this user is
        // rejected; a stale access token may get refreshed on the way.
        let outcome = session.authorize(&Requirement::User(user.username.clone()))?;
        if outcome.authorized {
            return Err(ServiceError::Conflict(outcome.reason));
        }

        if !verify_password(&password, &user.password)? {
            tracing::info!(username = %user.username, "Login rejected: wrong credentials");
            return Err(ServiceError::InvalidCredentials("wrong credentials".to_string()));
        }

        let identity = Identity::from(&user);
        let jwt = session.authenticator().jwt();
        let access_token = jwt.sign_access(&identity)?;
        let refresh_token = jwt.sign_refresh(&identity)?;

        self.store
            .set_refresh_token(&user.id, Some(&refresh_token))
            .await?;
        session.set_tokens(&access_token, &refresh_token);

        tracing::info!(username = %user.username, "User logged in");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub async fn logout(&self, session: &mut Session) -> Result<MessageResponse, ServiceError> {
        let refresh_token = session
            .refresh_token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::validation("RefreshToken does not exist"))?;

        let user = self
            .store
            .find_user_by_refresh_token(&refresh_token)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        self.store.set_refresh_token(&user.id, None).await?;
        session.clear_tokens();

        tracing::info!(username = %user.username, "User logged out");
        Ok(MessageResponse::new("User logged out"))
    }
}
