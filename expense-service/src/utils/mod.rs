pub mod password;
pub mod validation;

pub use password::{hash_password, verify_password};
pub use validation::{is_valid_amount_string, is_valid_email, JsonBody};
