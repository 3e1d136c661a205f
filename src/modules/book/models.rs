use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::metadata::models::Metadata;

/// A book listed in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub price: f64,
    pub stock: i32,
    pub review: Option<String>,
    pub image: Option<String>,
    pub is_new: bool,
    pub total_sold: i32,
    /// Owner; only this user may update or delete the book.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Loaded associations. `None` means "not loaded"; on save, `Some`
    /// replaces the whole association set.
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
}

/// Everything needed to insert a book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub name: String,
    pub author: String,
    pub price: f64,
    pub stock: i32,
    pub review: Option<String>,
    pub is_new: bool,
    pub user_id: i64,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Category together with its books, as returned by `GET /categories/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithBooks {
    #[serde(flatten)]
    pub category: Category,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// The part of a user exposed next to their reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

/// A review left on a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// `GET /book/{id}`: the book with its categories, reviews and metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub messages: Vec<Message>,
    pub metadata: Option<Metadata>,
}

/// Response of the category-scoped listing.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryBooks {
    pub cat: String,
    pub books: Vec<Book>,
}

/// Rows removed by a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub affected: u64,
}
