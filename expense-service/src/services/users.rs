use std::sync::Arc;

use validator::Validate;

use super::authenticator::Requirement;
use super::error::ServiceError;
use super::filters::TransactionFilter;
use super::store::ExpenseStore;
use crate::dtos::auth::{
    DeleteUserRequest, DeleteUserResponse, MessageResponse, RegisterRequest, UsersResponse,
};
use crate::dtos::non_blank;
use crate::middleware::Session;
use crate::models::{Role, User, UserInfo};
use crate::utils::{hash_password, is_valid_email};

/// Client-facing texts of one registration flavour.
struct RegistrationMessages {
    invalid_body: &'static str,
    invalid_email: &'static str,
    duplicate: &'static str,
    created: &'static str,
}

const MEMBER_REGISTRATION: RegistrationMessages = RegistrationMessages {
    invalid_body: "parameters are not valid",
    invalid_email: "email format is not correct",
    duplicate: "you are already registered",
    created: "User added succesfully",
};

const ADMIN_REGISTRATION: RegistrationMessages = RegistrationMessages {
    invalid_body: "Body error",
    invalid_email: "Format of email is not valid",
    duplicate: "You are already registered",
    created: "User registered successfully",
};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn ExpenseStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<MessageResponse, ServiceError> {
        self.create_account(req, Role::Regular, &MEMBER_REGISTRATION)
            .await
    }

    /// Open endpoint: creating an admin needs no authorization.
    pub async fn register_admin(
        &self,
        req: RegisterRequest,
    ) -> Result<MessageResponse, ServiceError> {
        self.create_account(req, Role::Admin, &ADMIN_REGISTRATION)
            .await
    }

    async fn create_account(
        &self,
        req: RegisterRequest,
        role: Role,
        messages: &RegistrationMessages,
    ) -> Result<MessageResponse, ServiceError> {
        req.validate()
            .map_err(|_| ServiceError::validation(messages.invalid_body))?;
        let (Some(username), Some(email), Some(password)) = (
            non_blank(req.username),
            non_blank(req.email),
            non_blank(req.password),
        ) else {
            return Err(ServiceError::validation(messages.invalid_body));
        };

        if !is_valid_email(&email) {
            return Err(ServiceError::validation(messages.invalid_email));
        }

        if self.store.find_user_by_email(&email).await?.is_some()
            || self.store.find_user_by_username(&username).await?.is_some()
        {
            return Err(ServiceError::validation(messages.duplicate));
        }

        let user = User::new(username, email, hash_password(&password)?, role);
        self.store.insert_user(&user).await?;

        tracing::info!(username = %user.username, role = %role, "User registered");
        Ok(MessageResponse::new(messages.created))
    }

    pub async fn list(&self, session: &mut Session) -> Result<UsersResponse, ServiceError> {
        session.require(&Requirement::Admin)?;
        let users = self.store.list_users().await?;
        Ok(UsersResponse {
            users: users.iter().map(UserInfo::from).collect(),
        })
    }

    pub async fn get(&self, session: &mut Session, username: &str) -> Result<UserInfo, ServiceError> {
        session.require_any(&[Requirement::Admin, Requirement::User(username.to_string())])?;
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        Ok(UserInfo::from(&user))
    }

    /// Removes a regular user together with their transactions and group
    /// membership. A group left without members is deleted.
    pub async fn delete(
        &self,
        session: &mut Session,
        req: DeleteUserRequest,
    ) -> Result<DeleteUserResponse, ServiceError> {
        session.require(&Requirement::Admin)?;

        let email = req
            .email
            .ok_or_else(|| ServiceError::validation("Request does not contain the email"))?;
        if email.is_empty() {
            return Err(ServiceError::validation("The email field is empty"));
        }
        if !is_valid_email(&email) {
            return Err(ServiceError::validation("Email format is not correct"));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found or doesn't exist"))?;
        if user.is_admin() {
            return Err(ServiceError::validation("Cannot delete an Admin"));
        }

        let transactions = TransactionFilter::for_user(&user.username);
        let deleted_transactions = self.store.count_transactions(&transactions).await?;
        if deleted_transactions > 0 {
            self.store.delete_transactions(&transactions).await?;
        }

        let deleted_from_group = match self.store.find_group_by_member(&email).await? {
            Some(group) if group.members.len() == 1 => {
                self.store.delete_group(&group.name).await?;
                true
            }
            Some(group) => {
                let remaining: Vec<_> = group
                    .members
                    .into_iter()
                    .filter(|m| m.email != email)
                    .collect();
                self.store
                    .update_group_members(&group.name, &remaining)
                    .await?;
                true
            }
            None => false,
        };

        self.store.delete_user(&user.id).await?;

        tracing::info!(
            username = %user.username,
            deleted_transactions,
            deleted_from_group,
            "User deleted"
        );
        Ok(DeleteUserResponse {
            deleted_transactions,
            deleted_from_group,
        })
    }
}
