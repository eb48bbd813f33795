use std::sync::Arc;

use validator::Validate;

use super::authenticator::Requirement;
use super::error::ServiceError;
use super::filters::TransactionFilter;
use super::store::ExpenseStore;
use crate::dtos::categories::{CategoryRequest, CountResponse, DeleteCategoriesRequest};
use crate::dtos::non_blank;
use crate::middleware::Session;
use crate::models::{Category, CategoryView};

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn ExpenseStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        session: &mut Session,
        req: CategoryRequest,
    ) -> Result<CategoryView, ServiceError> {
        session.require(&Requirement::Admin)?;
        let (category_type, color) = parse_category(req)?;

        if self.store.find_category(&category_type).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Category {} already exists",
                category_type
            )));
        }

        let category = Category::new(category_type, color);
        self.store.insert_category(&category).await?;
        Ok(CategoryView::from(&category))
    }

    /// Renames or recolors `current`. On a rename every transaction of the
    /// old type follows; `count` reports how many transactions carry the
    /// resulting type change.
    pub async fn update(
        &self,
        session: &mut Session,
        current: &str,
        req: CategoryRequest,
    ) -> Result<CountResponse, ServiceError> {
        session.require(&Requirement::Admin)?;

        if self.store.find_category(current).await?.is_none() {
            return Err(ServiceError::not_found(format!(
                "Category {} not found",
                current
            )));
        }

        let (new_type, color) = parse_category(req)?;
        let renamed = new_type != current;
        if renamed && self.store.find_category(&new_type).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Category {} already exist",
                new_type
            )));
        }

        let count = if renamed {
            self.store.retag_transactions(current, &new_type).await?
        } else {
            self.store
                .count_transactions(&TransactionFilter::default().with_category(current))
                .await?
        };
        self.store.update_category(current, &new_type, &color).await?;

        tracing::info!(category = %current, new_type = %new_type, count, "Category updated");
        Ok(CountResponse {
            message: format!("Category {} updated", current),
            count,
        })
    }

    /// Deletes the listed categories, moving their transactions to the
    /// oldest remaining category. At least one category always survives:
    /// when every category is listed, the first listed one is kept.
    pub async fn delete(
        &self,
        session: &mut Session,
        req: DeleteCategoriesRequest,
    ) -> Result<CountResponse, ServiceError> {
        session.require(&Requirement::Admin)?;

        req.validate()
            .map_err(|_| ServiceError::validation("Parameters are not valid"))?;
        let mut types = dedup(req.types.unwrap_or_default());
        if types.is_empty() {
            return Err(ServiceError::validation("Parameters are not valid"));
        }

        let existing = self.store.list_categories().await?;
        if existing.len() == 1 {
            return Err(ServiceError::validation("You can't delete all categories"));
        }
        if existing.len() == types.len() {
            types.remove(0);
        }

        for category_type in &types {
            if category_type.is_empty() {
                return Err(ServiceError::validation("Parameters are not valid"));
            }
            if !existing.iter().any(|c| c.category_type == *category_type) {
                return Err(ServiceError::not_found("Category not found"));
            }
        }

        let mut count = 0;
        for category_type in &types {
            self.store.delete_category(category_type).await?;
            if let Some(target) = self.store.list_categories().await?.first() {
                count += self
                    .store
                    .retag_transactions(category_type, &target.category_type)
                    .await?;
            }
        }

        tracing::info!(categories = ?types, count, "Categories deleted");
        Ok(CountResponse {
            message: format!("Categories {} deleted", types.join(",")),
            count,
        })
    }

    pub async fn list(&self, session: &mut Session) -> Result<Vec<CategoryView>, ServiceError> {
        session.require(&Requirement::Simple)?;
        let categories = self.store.list_categories().await?;
        Ok(categories.iter().map(CategoryView::from).collect())
    }
}

fn parse_category(req: CategoryRequest) -> Result<(String, String), ServiceError> {
    req.validate()
        .map_err(|_| ServiceError::validation("Parameters are not valid"))?;
    match (non_blank(req.category_type), non_blank(req.color)) {
        (Some(category_type), Some(color)) => Ok((category_type, color)),
        _ => Err(ServiceError::validation("Parameters are not valid")),
    }
}

fn dedup(types: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    types.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Transaction};
    use crate::services::store::MockStore;
    use crate::services::test_support::{logged_in, seed_category, seed_user, stale, store};

    fn body(category_type: &str, color: &str) -> CategoryRequest {
        CategoryRequest {
            category_type: Some(category_type.into()),
            color: Some(color.into()),
        }
    }

    fn delete_body(types: &[&str]) -> DeleteCategoriesRequest {
        DeleteCategoriesRequest {
            types: Some(types.iter().map(|t| t.to_string()).collect()),
        }
    }

    async fn spend(store: &MockStore, username: &str, category_type: &str, amount: f64) {
        store
            .insert_transaction(&Transaction::new(
                username.into(),
                category_type.into(),
                amount,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_category() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let service = CategoryService::new(store);

        let err = service
            .create(&mut logged_in(&mario), body("food", "red"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not authorized for this action");

        let view = service
            .create(&mut logged_in(&admin), body("food", "red"))
            .await
            .unwrap();
        assert_eq!(view.category_type, "food");

        let err = service
            .create(&mut logged_in(&admin), body("food", "blue"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Category food already exists");

        let err = service
            .create(&mut logged_in(&admin), body("", "blue"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Parameters are not valid");
    }

    #[tokio::test]
    async fn test_rename_category_moves_transactions() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        seed_category(&store, "food", "red").await;
        seed_category(&store, "health", "green").await;
        spend(&store, "mario", "food", 10.0).await;
        spend(&store, "mario", "food", 3.0).await;
        let service = CategoryService::new(store.clone());

        let res = service
            .update(&mut logged_in(&admin), "food", body("groceries", "orange"))
            .await
            .unwrap();
        assert_eq!(res.message, "Category food updated");
        assert_eq!(res.count, 2);
        assert!(store.find_category("food").await.unwrap().is_none());
        assert_eq!(
            store.find_category("groceries").await.unwrap().unwrap().color,
            "orange"
        );

        let err = service
            .update(&mut logged_in(&admin), "groceries", body("health", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Category health already exist");

        let err = service
            .update(&mut logged_in(&admin), "food", body("x", "y"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Category food not found");
    }

    #[tokio::test]
    async fn test_recolor_counts_existing_transactions() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        seed_category(&store, "food", "red").await;
        spend(&store, "mario", "food", 10.0).await;

        let res = CategoryService::new(store)
            .update(&mut logged_in(&admin), "food", body("food", "blue"))
            .await
            .unwrap();
        assert_eq!(res.count, 1);
    }

    #[tokio::test]
    async fn test_delete_categories_retags_to_oldest_remaining() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        seed_category(&store, "food", "red").await;
        seed_category(&store, "health", "green").await;
        seed_category(&store, "fun", "blue").await;
        spend(&store, "mario", "health", 1.0).await;
        spend(&store, "mario", "fun", 2.0).await;

        let res = CategoryService::new(store.clone())
            .delete(&mut logged_in(&admin), delete_body(&["health", "fun"]))
            .await
            .unwrap();
        assert_eq!(res.message, "Categories health,fun deleted");
        assert_eq!(res.count, 2);

        let remaining = store.list_categories().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            store
                .count_transactions(&TransactionFilter::default().with_category("food"))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_every_category_keeps_the_first_listed() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        seed_category(&store, "food", "red").await;
        seed_category(&store, "health", "green").await;
        spend(&store, "mario", "food", 1.0).await;

        let res = CategoryService::new(store.clone())
            .delete(&mut logged_in(&admin), delete_body(&["health", "food"]))
            .await
            .unwrap();
        assert_eq!(res.message, "Categories food deleted");
        assert_eq!(res.count, 1);

        let remaining = store.list_categories().await.unwrap();
        assert_eq!(remaining[0].category_type, "health");
    }

    #[tokio::test]
    async fn test_delete_categories_rejections() {
        let store = store();
        let admin = seed_user(&store, "admin", Role::Admin).await;
        seed_category(&store, "food", "red").await;
        let service = CategoryService::new(store.clone());

        let err = service
            .delete(&mut logged_in(&admin), delete_body(&["food"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You can't delete all categories");

        seed_category(&store, "health", "green").await;
        seed_category(&store, "fun", "blue").await;
        let cases = [
            (delete_body(&[]), "Parameters are not valid"),
            (DeleteCategoriesRequest { types: None }, "Parameters are not valid"),
            (delete_body(&["", "fun"]), "Parameters are not valid"),
            (delete_body(&["ghost"]), "Category not found"),
        ];
        for (req, expected) in cases {
            let err = service
                .delete(&mut logged_in(&admin), req)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
        assert_eq!(store.list_categories().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_categories_refreshes_stale_session() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        seed_category(&store, "food", "red").await;

        let mut session = stale(&mario);
        let categories = CategoryService::new(store)
            .list(&mut session)
            .await
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert!(session.was_refreshed());
    }
}
