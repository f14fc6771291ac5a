//! Repository implementations using SeaORM

pub mod book_repository;
pub mod checkout_repository;
pub mod role_repository;
pub mod user_repository;

pub use book_repository::SeaOrmBookRepository;
pub use checkout_repository::SeaOrmCheckoutRepository;
pub use role_repository::SeaOrmRoleRepository;
pub use user_repository::SeaOrmUserRepository;
