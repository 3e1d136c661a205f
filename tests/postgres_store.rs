//! [`PgStore`] against a live database.
//!
//! Needs `DATABASE_URL` pointing at a scratch database:
//! `DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored`

use std::sync::Arc;

use bookstore_app::images::DisabledImageHost;
use bookstore_app::modules::book::models::{Book, Category, NewBook};
use bookstore_app::modules::book::query::{
    apply_query, BookFilter, BookQuery, Order, Predicate,
};
use bookstore_app::modules::metadata::models::NewMetadata;
use bookstore_app::store::{MetadataExists, PgStore, Store};
use bookstore_app::App;
use bookstore_kernel::settings::{DatabaseSettings, Settings};
use sqlx::PgPool;

async fn migrated_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = bookstore_db::connect(&DatabaseSettings {
        url,
        ..DatabaseSettings::default()
    })
    .await
    .unwrap();

    let app = App::with_store(
        Settings::default(),
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(DisabledImageHost),
    );
    bookstore_db::run_migrations(&pool, &app.registry.collect_migrations())
        .await
        .unwrap();
    Some(pool)
}

/// Rows unique to this run, so leftovers from earlier runs do not interfere.
fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}")
}

async fn user(pool: &PgPool) -> i64 {
    let name = unique("owner");
    sqlx::query_scalar(
        "INSERT INTO users (username, email, password) VALUES ($1, $2, '') RETURNING id",
    )
    .bind(&name)
    .bind(format!("{name}@example.com"))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn category(pool: &PgPool, name: &str) -> Category {
    sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
        .bind(unique(name))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn new_book(user_id: i64, name: &str, price: f64, categories: Vec<Category>) -> NewBook {
    NewBook {
        name: name.to_string(),
        author: "Anonymous".to_string(),
        price,
        stock: 1,
        review: None,
        is_new: false,
        user_id,
        categories,
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn postgres_store_round_trips_books_and_metadata() {
    let Some(pool) = migrated_pool().await else {
        return;
    };
    let store = PgStore::new(pool.clone());
    assert!(store.healthy().await);

    let owner = user(&pool).await;
    let fiction = category(&pool, "Fiction").await;
    let history = category(&pool, "History").await;

    // Insert links categories inside the same transaction.
    let book = store
        .insert_book(new_book(owner, "Dune", 20.0, vec![fiction.clone()]))
        .await
        .unwrap();
    assert_eq!(book.categories, Some(vec![fiction.clone()]));

    // Some(categories) relinks, None leaves the links alone.
    let relinked = store
        .save_book(&Book {
            categories: Some(vec![history.clone()]),
            ..book.clone()
        })
        .await
        .unwrap();
    assert_eq!(relinked.categories, Some(vec![history.clone()]));
    store
        .save_book(&Book {
            stock: 7,
            categories: None,
            ..book.clone()
        })
        .await
        .unwrap();
    let details = store.book_details(book.id).await.unwrap().unwrap();
    assert_eq!(details.book.stock, 7);
    assert_eq!(details.book.categories, Some(vec![history.clone()]));

    // Two-step page fetch keeps the requested order and attaches the matches.
    let cheaper = store
        .insert_book(new_book(owner, "Cheaper", 5.0, vec![history.clone(), fiction.clone()]))
        .await
        .unwrap();
    let mut filter = BookFilter::joined_with_categories();
    filter.replace_where(Predicate::CategoryIs(history.id));
    apply_query(
        &mut filter,
        &BookQuery {
            order: Some(Order::PriceAsc),
            ..BookQuery::default()
        },
    );
    let page = store.find_books(&filter).await.unwrap();
    let ids: Vec<i64> = page.iter().map(|book| book.id).collect();
    assert_eq!(ids, vec![cheaper.id, book.id]);
    assert_eq!(page[0].categories, Some(vec![history.clone()]));

    filter.limit = Some(1);
    filter.offset = Some(1);
    let page = store.find_books(&filter).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, book.id);

    // One metadata row per book, enforced by the unique constraint.
    let metadata = || NewMetadata {
        pages: 412,
        publisher: "Chilton".to_string(),
        language: "en".to_string(),
        book_id: book.id,
    };
    let stored = store.insert_metadata(metadata()).await.unwrap();
    let err = store.insert_metadata(metadata()).await.unwrap_err();
    assert!(err.is::<MetadataExists>());

    assert_eq!(store.delete_book(book.id).await.unwrap(), 1);
    assert!(store.find_metadata(stored.id).await.unwrap().is_none());
    assert_eq!(store.delete_book(cheaper.id).await.unwrap(), 1);
}
