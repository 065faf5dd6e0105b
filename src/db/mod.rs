//! Database module for PostgreSQL connectivity
//!
//! Provides connection pool management and the image metadata repository.

pub mod pool;
pub mod models;
pub mod images;

pub use pool::{DbPool, DbError};
pub use images::{ImageRepository, PgImageRepository};
