//! User infrastructure module
//!
//! MySQL and in-memory repositories, plus the transactional user service.

mod mysql_repository;
mod repository;
mod service;

pub use mysql_repository::MySqlUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::UserService;
