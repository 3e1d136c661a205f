use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::{sql, MetadataExists, Store};
use crate::modules::book::models::{
    Book, BookDetails, Category, CategoryWithBooks, Message, NewBook, User, UserSummary,
};
use crate::modules::book::query::BookFilter;
use crate::modules::metadata::models::{BookRef, Metadata, NewMetadata};

const BOOK_COLUMNS: &str = "id, name, author, price, stock, review, image, is_new, total_sold, \
                            user_id, created_at, updated_at";

type MetadataRow = (i64, i32, String, String, i64);

fn metadata_from_row((id, pages, publisher, language, book_id): MetadataRow) -> Metadata {
    Metadata {
        id,
        pages,
        publisher,
        language,
        book: BookRef { id: book_id },
    }
}

/// PostgreSQL-backed store. The schema is created by the book and metadata
/// module migrations.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn categories_of(conn: &mut PgConnection, book_id: i64) -> Result<Vec<Category>> {
        sqlx::query_as(
            "SELECT c.id, c.name FROM categories c \
             JOIN book_categories bc ON bc.category_id = c.id \
             WHERE bc.book_id = $1 ORDER BY c.id",
        )
        .bind(book_id)
        .fetch_all(conn)
        .await
        .context("failed to load book categories")
    }

    async fn link_categories(
        conn: &mut PgConnection,
        book_id: i64,
        categories: &[Category],
    ) -> Result<()> {
        let ids: Vec<i64> = categories.iter().map(|category| category.id).collect();
        sqlx::query(
            "INSERT INTO book_categories (book_id, category_id) \
             SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
        )
        .bind(book_id)
        .bind(&ids)
        .execute(conn)
        .await
        .context("failed to link book categories")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_books(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let ids_sql = sql::book_ids(filter);
        tracing::debug!(sql = %ids_sql, "listing books");

        let ids: Vec<i64> = sqlx::query_scalar(&ids_sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to select book ids")?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Book> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to load books")?;
        let mut by_id: HashMap<i64, Book> = rows.into_iter().map(|book| (book.id, book)).collect();

        let mut matched: HashMap<i64, Vec<Category>> = HashMap::new();
        if filter.joins_categories() {
            let categories_sql = sql::matched_categories(filter, &ids);
            let rows: Vec<(i64, i64, String)> = sqlx::query_as(&categories_sql)
                .fetch_all(&self.pool)
                .await
                .context("failed to load matched categories")?;
            for (book_id, id, name) in rows {
                matched.entry(book_id).or_default().push(Category { id, name });
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|book| {
                if filter.joins_categories() {
                    let categories = matched.remove(&book.id).unwrap_or_default();
                    Book {
                        categories: Some(categories),
                        ..book
                    }
                } else {
                    book
                }
            })
            .collect())
    }

    async fn best_sellers(&self, take: u64) -> Result<Vec<Book>> {
        let take = i64::try_from(take).unwrap_or(i64::MAX);
        sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY total_sold DESC, id ASC LIMIT $1"
        ))
        .bind(take)
        .fetch_all(&self.pool)
        .await
        .context("failed to load best sellers")
    }

    async fn find_book(&self, id: i64) -> Result<Option<Book>> {
        sqlx::query_as(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load book")
    }

    async fn book_details(&self, id: i64) -> Result<Option<BookDetails>> {
        let mut conn = self.pool.acquire().await.context("failed to acquire connection")?;

        let book: Option<Book> =
            sqlx::query_as(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .context("failed to load book")?;
        let Some(book) = book else {
            return Ok(None);
        };

        let categories = Self::categories_of(&mut conn, id).await?;

        let messages = sqlx::query_as::<_, (i64, String, DateTime<Utc>, DateTime<Utc>, i64, String)>(
            "SELECT m.id, m.message, m.created_at, m.updated_at, u.id, u.username \
             FROM messages m JOIN users u ON u.id = m.user_id \
             WHERE m.book_id = $1 ORDER BY m.created_at",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .context("failed to load book messages")?
        .into_iter()
        .map(|(id, message, created_at, updated_at, user_id, username)| Message {
            id,
            message,
            created_at,
            updated_at,
            user: UserSummary {
                id: user_id,
                username,
            },
        })
        .collect();

        let metadata = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, pages, publisher, language, book_id FROM metadata WHERE book_id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to load book metadata")?
        .map(metadata_from_row);

        Ok(Some(BookDetails {
            book: Book {
                categories: Some(categories),
                ..book
            },
            messages,
            metadata,
        }))
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let row: Book = sqlx::query_as(&format!(
            "INSERT INTO books (name, author, price, stock, review, is_new, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.name)
        .bind(&book.author)
        .bind(book.price)
        .bind(book.stock)
        .bind(&book.review)
        .bind(book.is_new)
        .bind(book.user_id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert book")?;

        Self::link_categories(&mut tx, row.id, &book.categories).await?;
        let categories = Self::categories_of(&mut tx, row.id).await?;
        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(book_id = row.id, "book created");
        Ok(Book {
            categories: Some(categories),
            ..row
        })
    }

    async fn save_book(&self, book: &Book) -> Result<Book> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let row: Book = sqlx::query_as(&format!(
            "UPDATE books SET name = $2, author = $3, price = $4, stock = $5, review = $6, \
             image = $7, is_new = $8, total_sold = $9, user_id = $10, updated_at = now() \
             WHERE id = $1 RETURNING {BOOK_COLUMNS}"
        ))
        .bind(book.id)
        .bind(&book.name)
        .bind(&book.author)
        .bind(book.price)
        .bind(book.stock)
        .bind(&book.review)
        .bind(&book.image)
        .bind(book.is_new)
        .bind(book.total_sold)
        .bind(book.user_id)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to update book {}", book.id))?;

        let categories = match &book.categories {
            Some(categories) => {
                sqlx::query("DELETE FROM book_categories WHERE book_id = $1")
                    .bind(book.id)
                    .execute(&mut *tx)
                    .await
                    .context("failed to unlink book categories")?;
                Self::link_categories(&mut tx, book.id, categories).await?;
                Some(Self::categories_of(&mut tx, book.id).await?)
            }
            None => None,
        };
        tx.commit().await.context("failed to commit transaction")?;

        Ok(Book { categories, ..row })
    }

    async fn delete_book(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete book")?;
        Ok(result.rows_affected())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as(
            "SELECT id, username, email, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load user")
    }

    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>> {
        sqlx::query_as("SELECT id, name FROM categories WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .context("failed to load categories")
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list categories")
    }

    async fn category_with_books(&self, id: i64) -> Result<Option<CategoryWithBooks>> {
        let category: Option<Category> =
            sqlx::query_as("SELECT id, name FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to load category")?;
        let Some(category) = category else {
            return Ok(None);
        };

        let books = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE id IN (SELECT book_id FROM book_categories WHERE category_id = $1) \
             ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("failed to load category books")?;

        Ok(Some(CategoryWithBooks { category, books }))
    }

    async fn find_metadata(&self, id: i64) -> Result<Option<Metadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, pages, publisher, language, book_id FROM metadata WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load metadata")?;
        Ok(row.map(metadata_from_row))
    }

    async fn insert_metadata(&self, metadata: NewMetadata) -> Result<Metadata> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "INSERT INTO metadata (pages, publisher, language, book_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, pages, publisher, language, book_id",
        )
        .bind(metadata.pages)
        .bind(&metadata.publisher)
        .bind(&metadata.language)
        .bind(metadata.book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                anyhow::Error::new(MetadataExists(metadata.book_id))
            }
            other => anyhow::Error::new(other).context("failed to insert metadata"),
        })?;
        Ok(metadata_from_row(row))
    }

    async fn save_metadata(&self, metadata: &Metadata) -> Result<Metadata> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "UPDATE metadata SET pages = $2, publisher = $3, language = $4 WHERE id = $1 \
             RETURNING id, pages, publisher, language, book_id",
        )
        .bind(metadata.id)
        .bind(metadata.pages)
        .bind(&metadata.publisher)
        .bind(&metadata.language)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to update metadata {}", metadata.id))?;
        Ok(metadata_from_row(row))
    }

    async fn delete_metadata(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metadata WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete metadata")?;
        Ok(result.rows_affected())
    }

    async fn healthy(&self) -> bool {
        bookstore_db::check_health(&self.pool).await
    }
}
