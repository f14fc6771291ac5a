pub mod book;
pub mod checkout;
pub mod permission;
pub mod role;
pub mod role_permission;
pub mod user;
pub mod user_role;

pub use book::{Book, BookStatus};
pub use user::UserSummary;
