use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::error::ServiceError;
use super::filters::TransactionFilter;
use crate::models::{Category, Group, GroupMember, Transaction, TransactionView, User};

/// Persistence boundary of the service. Implemented by [`MongoStore`] and,
/// for tests and local runs, by [`MockStore`].
///
/// [`MongoStore`]: super::database::MongoStore
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_refresh_token(&self, token: &str)
        -> Result<Option<User>, ServiceError>;
    async fn find_users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, ServiceError>;
    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    /// Persists (or clears) the refresh token of the session owned by `user_id`.
    async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<(), ServiceError>;
    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError>;

    async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, ServiceError>;
    async fn find_group_by_member(&self, email: &str) -> Result<Option<Group>, ServiceError>;
    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError>;
    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError>;
    async fn update_group_members(
        &self,
        name: &str,
        members: &[GroupMember],
    ) -> Result<(), ServiceError>;
    async fn delete_group(&self, name: &str) -> Result<(), ServiceError>;

    async fn find_category(&self, category_type: &str) -> Result<Option<Category>, ServiceError>;
    /// All categories, oldest first.
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError>;
    async fn insert_category(&self, category: &Category) -> Result<(), ServiceError>;
    async fn update_category(
        &self,
        current_type: &str,
        new_type: &str,
        color: &str,
    ) -> Result<(), ServiceError>;
    async fn delete_category(&self, category_type: &str) -> Result<(), ServiceError>;

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), ServiceError>;
    async fn find_transaction(&self, id: &str) -> Result<Option<Transaction>, ServiceError>;
    /// Matching transactions joined with their category color. Transactions
    /// whose category no longer exists are left out.
    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionView>, ServiceError>;
    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError>;
    /// Moves every transaction of `from_type` to `to_type`; returns how many changed.
    async fn retag_transactions(&self, from_type: &str, to_type: &str)
        -> Result<u64, ServiceError>;
    async fn delete_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError>;
    async fn delete_transaction(&self, id: &str) -> Result<bool, ServiceError>;
}

#[derive(Default)]
struct MockData {
    users: Vec<User>,
    groups: Vec<Group>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
}

/// In-memory store.
#[derive(Default)]
pub struct MockStore {
    data: Mutex<MockData>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<MutexGuard<'_, MockData>, ServiceError> {
        self.data
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl ExpenseStore for MockStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.data().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.data()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .data()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .data()?
            .users
            .iter()
            .find(|u| u.refresh_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, ServiceError> {
        Ok(self
            .data()?
            .users
            .iter()
            .filter(|u| emails.contains(&u.email))
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.data()?.users.clone())
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.data()?.users.push(user.clone());
        Ok(())
    }

    async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.data()?.users.iter_mut().find(|u| u.id == user_id) {
            user.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.data()?.users.retain(|u| u.id != user_id);
        Ok(())
    }

    async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.data()?.groups.iter().find(|g| g.name == name).cloned())
    }

    async fn find_group_by_member(&self, email: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self
            .data()?
            .groups
            .iter()
            .find(|g| g.has_member(email))
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        Ok(self.data()?.groups.clone())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError> {
        self.data()?.groups.push(group.clone());
        Ok(())
    }

    async fn update_group_members(
        &self,
        name: &str,
        members: &[GroupMember],
    ) -> Result<(), ServiceError> {
        if let Some(group) = self.data()?.groups.iter_mut().find(|g| g.name == name) {
            group.members = members.to_vec();
        }
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), ServiceError> {
        self.data()?.groups.retain(|g| g.name != name);
        Ok(())
    }

    async fn find_category(&self, category_type: &str) -> Result<Option<Category>, ServiceError> {
        Ok(self
            .data()?
            .categories
            .iter()
            .find(|c| c.category_type == category_type)
            .cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        let mut categories = self.data()?.categories.clone();
        categories.sort_by_key(|c| c.created_at);
        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), ServiceError> {
        self.data()?.categories.push(category.clone());
        Ok(())
    }

    async fn update_category(
        &self,
        current_type: &str,
        new_type: &str,
        color: &str,
    ) -> Result<(), ServiceError> {
        let mut data = self.data()?;
        if let Some(category) = data
            .categories
            .iter_mut()
            .find(|c| c.category_type == current_type)
        {
            category.category_type = new_type.to_string();
            category.color = color.to_string();
        }
        Ok(())
    }

    async fn delete_category(&self, category_type: &str) -> Result<(), ServiceError> {
        self.data()?
            .categories
            .retain(|c| c.category_type != category_type);
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        self.data()?.transactions.push(transaction.clone());
        Ok(())
    }

    async fn find_transaction(&self, id: &str) -> Result<Option<Transaction>, ServiceError> {
        Ok(self
            .data()?
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        let data = self.data()?;
        Ok(data
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .filter_map(|t| {
                data.categories
                    .iter()
                    .find(|c| c.category_type == t.category_type)
                    .map(|c| TransactionView::joined(t, &c.color))
            })
            .collect())
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError> {
        Ok(self
            .data()?
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .count() as u64)
    }

    async fn retag_transactions(
        &self,
        from_type: &str,
        to_type: &str,
    ) -> Result<u64, ServiceError> {
        if from_type == to_type {
            return Ok(0);
        }
        let mut modified = 0;
        for tx in self
            .data()?
            .transactions
            .iter_mut()
            .filter(|t| t.category_type == from_type)
        {
            tx.category_type = to_type.to_string();
            modified += 1;
        }
        Ok(modified)
    }

    async fn delete_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError> {
        let mut data = self.data()?;
        let before = data.transactions.len();
        data.transactions.retain(|t| !filter.matches(t));
        Ok((before - data.transactions.len()) as u64)
    }

    async fn delete_transaction(&self, id: &str) -> Result<bool, ServiceError> {
        let mut data = self.data()?;
        let before = data.transactions.len();
        data.transactions.retain(|t| t.id != id);
        Ok(data.transactions.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_transactions_inner_joins_categories() {
        let store = MockStore::new();
        store
            .insert_category(&Category::new("food".into(), "red".into()))
            .await
            .unwrap();
        store
            .insert_transaction(&Transaction::new("mario".into(), "food".into(), 10.0))
            .await
            .unwrap();
        store
            .insert_transaction(&Transaction::new("mario".into(), "orphan".into(), 5.0))
            .await
            .unwrap();

        let views = store
            .find_transactions(&TransactionFilter::for_user("mario"))
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].color, "red");
        assert_eq!(
            store
                .count_transactions(&TransactionFilter::for_user("mario"))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_refresh_token_lookup_follows_updates() {
        let store = MockStore::new();
        let user = User::new("mario".into(), "m@example.com".into(), "hash".into(), Default::default());
        store.insert_user(&user).await.unwrap();

        store.set_refresh_token(&user.id, Some("tok")).await.unwrap();
        assert!(store.find_user_by_refresh_token("tok").await.unwrap().is_some());

        store.set_refresh_token(&user.id, None).await.unwrap();
        assert!(store.find_user_by_refresh_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retag_counts_modified() {
        let store = MockStore::new();
        for _ in 0..3 {
            store
                .insert_transaction(&Transaction::new("mario".into(), "food".into(), 1.0))
                .await
                .unwrap();
        }
        assert_eq!(store.retag_transactions("food", "home").await.unwrap(), 3);
        assert_eq!(store.retag_transactions("home", "home").await.unwrap(), 0);
    }
}
