//! Persistence for books, categories, users, reviews and metadata.
//!
//! Two backends implement [`Store`]: [`MemoryStore`] keeps everything in
//! process and evaluates [`BookFilter`]s directly; [`PgStore`] renders them
//! to SQL with sea-query and runs them through sqlx.

mod memory;
mod postgres;
pub mod sql;

use anyhow::Result;
use async_trait::async_trait;

use crate::modules::book::models::{
    Book, BookDetails, Category, CategoryWithBooks, NewBook, User,
};
use crate::modules::book::query::BookFilter;
use crate::modules::metadata::models::{Metadata, NewMetadata};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Raised by [`Store::insert_metadata`] when the book already has metadata.
#[derive(Debug, thiserror::Error)]
#[error("book {0} already has metadata")]
pub struct MetadataExists(pub i64);

#[async_trait]
pub trait Store: Send + Sync {
    /// Books matching `filter`, in its order, paginated.
    async fn find_books(&self, filter: &BookFilter) -> Result<Vec<Book>>;

    /// Up to `take` books by descending `total_sold`.
    async fn best_sellers(&self, take: u64) -> Result<Vec<Book>>;

    /// The book row alone; categories are not loaded.
    async fn find_book(&self, id: i64) -> Result<Option<Book>>;

    async fn book_details(&self, id: i64) -> Result<Option<BookDetails>>;

    async fn insert_book(&self, book: NewBook) -> Result<Book>;

    /// Persist every column of `book`. When `book.categories` is `Some`, the
    /// association set is replaced by it.
    async fn save_book(&self, book: &Book) -> Result<Book>;

    /// Returns the number of rows removed.
    async fn delete_book(&self, id: i64) -> Result<u64>;

    async fn find_user(&self, id: i64) -> Result<Option<User>>;

    /// Categories whose id is in `ids`; unknown ids are ignored.
    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn category_with_books(&self, id: i64) -> Result<Option<CategoryWithBooks>>;

    async fn find_metadata(&self, id: i64) -> Result<Option<Metadata>>;

    /// Fails with [`MetadataExists`] when the book already has a row.
    async fn insert_metadata(&self, metadata: NewMetadata) -> Result<Metadata>;

    async fn save_metadata(&self, metadata: &Metadata) -> Result<Metadata>;

    async fn delete_metadata(&self, id: i64) -> Result<u64>;

    /// Whether the backend currently answers queries.
    async fn healthy(&self) -> bool;
}
