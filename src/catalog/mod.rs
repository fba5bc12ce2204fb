//! Catalog collaborator abstraction
//!
//! The recommendation core never talks to storage directly. It asks a
//! `CatalogStore` for a user's favorites and for the full catalog, and each
//! backend (PostgreSQL, the catalog REST API) implements both.

use crate::{
    error::AppResult,
    models::{BookId, BookRecord, UserId},
};

pub mod postgres;
pub mod rest;

pub use postgres::{create_pool, PgCatalog};
pub use rest::RestCatalog;

/// Trait for catalog backends
///
/// Implementations must report an unreachable backend as
/// `AppError::DataUnavailable` and must not retry on their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Book ids the user has favorited, possibly empty
    async fn list_favorite_book_ids(&self, user_id: UserId) -> AppResult<Vec<BookId>>;

    /// Every book in the catalog with authors expanded, in title order
    ///
    /// Must be a single bulk read, not one round-trip per book.
    async fn fetch_all_books(&self) -> AppResult<Vec<BookRecord>>;

    /// Backend name for logging and debugging
    fn name(&self) -> &'static str;
}
