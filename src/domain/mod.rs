pub mod error;
pub mod expense;
pub mod repository;
pub mod user;
