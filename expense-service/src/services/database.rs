use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde::Deserialize;
use service_core::error::AppError;

use super::error::ServiceError;
use super::filters::TransactionFilter;
use super::store::ExpenseStore;
use crate::models::{Category, Group, GroupMember, Transaction, TransactionView, User};

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

/// Aggregation output of the transaction/category join.
#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    #[serde(rename = "type")]
    category_type: String,
    amount: f64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    date: DateTime<Utc>,
    color: String,
}

impl From<TransactionRow> for TransactionView {
    fn from(row: TransactionRow) -> Self {
        TransactionView {
            id: Some(row.id),
            username: row.username,
            category_type: row.category_type,
            amount: row.amount,
            date: row.date,
            color: row.color,
        }
    }
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for expense-service");

        let unique = |name: &str| {
            IndexOptions::builder()
                .name(name.to_string())
                .unique(true)
                .build()
        };

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique("email_unique"))
                    .build(),
                None,
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique("username_unique"))
                    .build(),
                None,
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "refreshToken": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("refresh_token_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        self.groups()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique("group_name_unique"))
                    .build(),
                None,
            )
            .await?;
        self.groups()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "members.email": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("member_email_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        self.categories()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "type": 1 })
                    .options(unique("category_type_unique"))
                    .build(),
                None,
            )
            .await?;
        self.transactions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1, "type": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("user_type_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn groups(&self) -> Collection<Group> {
        self.db.collection("groups")
    }

    fn categories(&self) -> Collection<Category> {
        self.db.collection("categories")
    }

    fn transactions(&self) -> Collection<Transaction> {
        self.db.collection("transactions")
    }

    async fn find_users(&self, filter: Document) -> Result<Vec<User>, ServiceError> {
        Ok(self.users().find(filter, None).await?.try_collect().await?)
    }
}

#[async_trait]
impl ExpenseStore for MongoStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::from(e)
            })?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn find_user_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one(doc! { "refreshToken": token }, None)
            .await?)
    }

    async fn find_users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, ServiceError> {
        self.find_users(doc! { "email": { "$in": emails.to_vec() } })
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.find_users(doc! {}).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "refreshToken": token } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.users().delete_one(doc! { "_id": user_id }, None).await?;
        Ok(())
    }

    async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.groups().find_one(doc! { "name": name }, None).await?)
    }

    async fn find_group_by_member(&self, email: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self
            .groups()
            .find_one(doc! { "members": { "$elemMatch": { "email": email } } }, None)
            .await?)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        Ok(self.groups().find(doc! {}, None).await?.try_collect().await?)
    }

    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError> {
        self.groups().insert_one(group, None).await?;
        Ok(())
    }

    async fn update_group_members(
        &self,
        name: &str,
        members: &[GroupMember],
    ) -> Result<(), ServiceError> {
        let members = bson::to_bson(members)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode members: {}", e)))?;
        self.groups()
            .update_one(
                doc! { "name": name },
                doc! { "$set": { "members": members } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), ServiceError> {
        self.groups().delete_one(doc! { "name": name }, None).await?;
        Ok(())
    }

    async fn find_category(&self, category_type: &str) -> Result<Option<Category>, ServiceError> {
        Ok(self
            .categories()
            .find_one(doc! { "type": category_type }, None)
            .await?)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        Ok(self
            .categories()
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), ServiceError> {
        self.categories().insert_one(category, None).await?;
        Ok(())
    }

    async fn update_category(
        &self,
        current_type: &str,
        new_type: &str,
        color: &str,
    ) -> Result<(), ServiceError> {
        self.categories()
            .update_one(
                doc! { "type": current_type },
                doc! { "$set": { "type": new_type, "color": color } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_category(&self, category_type: &str) -> Result<(), ServiceError> {
        self.categories()
            .delete_one(doc! { "type": category_type }, None)
            .await?;
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        self.transactions().insert_one(transaction, None).await?;
        Ok(())
    }

    async fn find_transaction(&self, id: &str) -> Result<Option<Transaction>, ServiceError> {
        Ok(self
            .transactions()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionView>, ServiceError> {
        let pipeline = vec![
            doc! { "$match": filter.to_document() },
            doc! {
                "$lookup": {
                    "from": "categories",
                    "localField": "type",
                    "foreignField": "type",
                    "as": "category"
                }
            },
            doc! { "$unwind": "$category" },
            doc! {
                "$project": {
                    "_id": 1,
                    "username": 1,
                    "type": 1,
                    "amount": 1,
                    "date": 1,
                    "color": "$category.color"
                }
            },
        ];

        let rows: Vec<Document> = self
            .transactions()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        rows.into_iter()
            .map(|row| {
                bson::from_document::<TransactionRow>(row)
                    .map(TransactionView::from)
                    .map_err(|e| {
                        ServiceError::Internal(anyhow::anyhow!("Malformed transaction row: {}", e))
                    })
            })
            .collect()
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError> {
        Ok(self
            .transactions()
            .count_documents(filter.to_document(), None)
            .await?)
    }

    async fn retag_transactions(
        &self,
        from_type: &str,
        to_type: &str,
    ) -> Result<u64, ServiceError> {
        let result = self
            .transactions()
            .update_many(
                doc! { "type": from_type },
                doc! { "$set": { "type": to_type } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn delete_transactions(&self, filter: &TransactionFilter) -> Result<u64, ServiceError> {
        let result = self
            .transactions()
            .delete_many(filter.to_document(), None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_transaction(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self
            .transactions()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
