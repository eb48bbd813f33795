//! HTTP handlers for the expense service.
//!
//! Handlers stay thin: they extract the [`Session`](crate::middleware::Session)
//! and the request inputs, call the owning service, and let the session
//! render the envelope together with the cookie updates.

pub mod auth;
pub mod categories;
pub mod groups;
pub mod health;
pub mod metrics;
pub mod transactions;
pub mod users;
