pub mod category;
pub mod group;
pub mod transaction;
pub mod user;

pub use category::{Category, CategoryView};
pub use group::{Group, GroupMember, GroupView, MemberEmail};
pub use transaction::{Transaction, TransactionView};
pub use user::{Role, User, UserInfo};
