use std::sync::Arc;

use validator::Validate;

use super::authenticator::{Audience, Requirement};
use super::error::ServiceError;
use super::filters::{build_amount_filter, build_date_filter, TransactionFilter, TransactionQuery};
use super::store::ExpenseStore;
use crate::dtos::auth::MessageResponse;
use crate::dtos::non_blank;
use crate::dtos::transactions::{
    parse_amount, AmountError, CreateTransactionRequest, CreatedTransaction,
    DeleteTransactionRequest, DeleteTransactionsRequest,
};
use crate::middleware::Session;
use crate::models::{Group, Transaction, TransactionView};

#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn ExpenseStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    /// Body checks run before authorization, so malformed requests are
    /// reported even without a session.
    pub async fn create(
        &self,
        session: &mut Session,
        username: &str,
        req: CreateTransactionRequest,
    ) -> Result<CreatedTransaction, ServiceError> {
        req.validate()
            .map_err(|_| ServiceError::validation("Body error"))?;
        let (Some(body_username), Some(category_type), Some(amount)) = (
            non_blank(req.username),
            non_blank(req.category_type),
            req.amount,
        ) else {
            return Err(ServiceError::validation("Body error"));
        };
        let amount = parse_amount(&amount).map_err(|e| match e {
            AmountError::Missing => ServiceError::validation("Body error"),
            AmountError::NotAFloat => ServiceError::validation("Amount is not a float"),
        })?;

        if body_username != username {
            return Err(ServiceError::validation("Usernames not equal"));
        }

        session.require(&Requirement::User(username.to_string()))?;

        if self.store.find_user_by_username(username).await?.is_none() {
            return Err(ServiceError::not_found("Username invalid"));
        }
        if self.store.find_category(&category_type).await?.is_none() {
            return Err(ServiceError::not_found("Category type invalid"));
        }

        let transaction = Transaction::new(body_username, category_type, amount);
        self.store.insert_transaction(&transaction).await?;

        tracing::debug!(
            username = %transaction.username,
            category = %transaction.category_type,
            "Transaction created"
        );
        Ok(CreatedTransaction {
            username: transaction.username,
            category_type: transaction.category_type,
            amount: transaction.amount,
            date: transaction.date,
        })
    }

    pub async fn list_all(&self, session: &mut Session) -> Result<Vec<TransactionView>, ServiceError> {
        session.require(&Requirement::Admin)?;
        let views = self
            .store
            .find_transactions(&TransactionFilter::default())
            .await?;
        Ok(views.into_iter().map(TransactionView::without_id).collect())
    }

    /// Members see their own transactions, optionally narrowed by the date
    /// and amount query parameters. Admins get the unfiltered list.
    pub async fn list_by_user(
        &self,
        session: &mut Session,
        username: &str,
        query: &TransactionQuery,
        audience: Audience,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        session.require(&user_requirement(username, audience))?;
        self.ensure_user(username).await?;

        let mut filter = TransactionFilter::for_user(username);
        if audience == Audience::Member {
            filter.date = build_date_filter(query)?;
            filter.amount = build_amount_filter(query)?;
        }
        self.store.find_transactions(&filter).await
    }

    pub async fn list_by_user_category(
        &self,
        session: &mut Session,
        username: &str,
        category: &str,
        audience: Audience,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        session.require(&user_requirement(username, audience))?;
        self.ensure_user(username).await?;
        if self.store.find_category(category).await?.is_none() {
            return Err(ServiceError::not_found("Category doesn't exist"));
        }

        let filter = TransactionFilter::for_user(username).with_category(category);
        self.store.find_transactions(&filter).await
    }

    pub async fn list_by_group(
        &self,
        session: &mut Session,
        name: &str,
        audience: Audience,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        let group = self.find_group(name).await?;
        session.require(&group_requirement(&group, audience))?;

        let filter = self.member_filter(&group).await?;
        let views = self.store.find_transactions(&filter).await?;
        Ok(views.into_iter().map(TransactionView::without_id).collect())
    }

    pub async fn list_by_group_category(
        &self,
        session: &mut Session,
        name: &str,
        category: &str,
        audience: Audience,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        let group = self.find_group(name).await?;
        session.require(&group_requirement(&group, audience))?;
        if self.store.find_category(category).await?.is_none() {
            return Err(ServiceError::not_found("Category not found"));
        }

        let filter = self.member_filter(&group).await?.with_category(category);
        let views = self.store.find_transactions(&filter).await?;
        Ok(views.into_iter().map(TransactionView::without_id).collect())
    }

    pub async fn delete(
        &self,
        session: &mut Session,
        username: &str,
        req: DeleteTransactionRequest,
    ) -> Result<MessageResponse, ServiceError> {
        session.require(&Requirement::User(username.to_string()))?;

        let id = req.id.ok_or_else(|| {
            ServiceError::validation("Request body does not contain all the necessary attributes")
        })?;
        if id.is_empty() {
            return Err(ServiceError::validation("Transaction ID is an empty string"));
        }

        if self.store.find_user_by_username(username).await?.is_none() {
            return Err(ServiceError::not_found("User of the transaction does not exist"));
        }

        let owned = self
            .store
            .find_transaction(&id)
            .await?
            .filter(|tx| tx.username == username);
        if owned.is_none() {
            return Err(ServiceError::not_found(format!(
                "{} does not correspond to any transaction",
                id
            )));
        }

        self.store.delete_transaction(&id).await?;
        Ok(MessageResponse::new("Transaction has been deleted"))
    }

    /// All ids are checked before anything is deleted.
    pub async fn delete_many(
        &self,
        session: &mut Session,
        req: DeleteTransactionsRequest,
    ) -> Result<MessageResponse, ServiceError> {
        session.require(&Requirement::Admin)?;

        let ids = req
            .ids
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| ServiceError::validation("Input is not valid"))?;

        for id in &ids {
            if id.is_empty() {
                return Err(ServiceError::validation("empty string passed"));
            }
            if self.store.find_transaction(id).await?.is_none() {
                return Err(ServiceError::not_found(format!(
                    "{} does not correspond to any transaction",
                    id
                )));
            }
        }

        for id in &ids {
            self.store.delete_transaction(id).await?;
        }

        tracing::info!(count = ids.len(), "Transactions deleted");
        Ok(MessageResponse::new("Transactions deleted"))
    }

    async fn ensure_user(&self, username: &str) -> Result<(), ServiceError> {
        match self.store.find_user_by_username(username).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found("User doesn't exist")),
        }
    }

    async fn find_group(&self, name: &str) -> Result<Group, ServiceError> {
        self.store
            .find_group_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group not found"))
    }

    /// Selects the transactions of every registered member of `group`.
    async fn member_filter(&self, group: &Group) -> Result<TransactionFilter, ServiceError> {
        let users = self
            .store
            .find_users_by_emails(&group.member_emails())
            .await?;
        Ok(TransactionFilter::for_users(
            users.into_iter().map(|u| u.username).collect(),
        ))
    }
}

fn user_requirement(username: &str, audience: Audience) -> Requirement {
    match audience {
        Audience::Member => Requirement::User(username.to_string()),
        Audience::Admin => Requirement::Admin,
    }
}

fn group_requirement(group: &Group, audience: Audience) -> Requirement {
    match audience {
        Audience::Member => Requirement::group(group.member_emails()),
        Audience::Admin => Requirement::Admin,
    }
}
