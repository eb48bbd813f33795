//! Business logic of the expense service.
//!
//! Each service owns one resource and talks to persistence only through
//! [`ExpenseStore`], so the Mongo store and the in-memory store are
//! interchangeable.

pub mod authenticator;
mod categories;
mod database;
pub mod error;
pub mod filters;
mod groups;
pub mod jwt;
pub mod metrics;
mod session;
pub mod store;
mod transactions;
mod users;

#[cfg(test)]
mod test_support;

pub use authenticator::{Audience, Authenticator, Requirement};
pub use categories::CategoryService;
pub use database::MongoStore;
pub use error::ServiceError;
pub use groups::GroupService;
pub use jwt::JwtService;
pub use session::SessionService;
pub use store::{ExpenseStore, MockStore};
pub use transactions::TransactionService;
pub use users::UserService;
