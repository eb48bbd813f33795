//! Request and response bodies of the HTTP API.
//!
//! Request fields are optional so that each operation can report a missing
//! field with its own message; `validator` checks presence.

pub mod auth;
pub mod categories;
pub mod groups;
pub mod transactions;

/// Returns the value when present and not blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
