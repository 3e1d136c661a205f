use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::{MetadataExists, Store};
use crate::modules::book::models::{
    Book, BookDetails, Category, CategoryWithBooks, Message, NewBook, User, UserSummary,
};
use crate::modules::book::query::{BookFilter, Direction, OrderClause, Predicate, SortKey};
use crate::modules::metadata::models::{BookRef, Metadata, NewMetadata};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: i64,
    book_id: i64,
    user_id: i64,
    message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    books: BTreeMap<i64, Book>,
    /// (book id, category id)
    links: BTreeSet<(i64, i64)>,
    messages: BTreeMap<i64, StoredMessage>,
    metadata: BTreeMap<i64, Metadata>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Wall clock, nudged forward so that timestamps never repeat.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn categories_of(&self, book_id: i64) -> Vec<Category> {
        self.links
            .range((book_id, i64::MIN)..=(book_id, i64::MAX))
            .filter_map(|(_, category_id)| self.categories.get(category_id).cloned())
            .collect()
    }

    fn replace_links(&mut self, book_id: i64, categories: &[Category]) {
        self.links.retain(|(linked_book, _)| *linked_book != book_id);
        for category in categories {
            if self.categories.contains_key(&category.id) {
                self.links.insert((book_id, category.id));
            }
        }
    }
}

/// In-process store used by tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with a demo owner, a few categories and two books.
    pub fn seeded() -> Self {
        let store = Self::new();
        let owner = store.add_user("admin", "admin@bookstore.local", "admin");
        let programming = store.add_category("Programming");
        for name in ["Fiction", "Science", "History"] {
            store.add_category(name);
        }

        for (name, author, price) in [
            ("The Rust Programming Language", "Steve Klabnik", 39.0),
            ("Programming Rust", "Jim Blandy", 49.0),
        ] {
            let mut state = store.state.write();
            let id = state.next_id();
            let now = state.now();
            state.books.insert(
                id,
                Book {
                    id,
                    name: name.to_string(),
                    author: author.to_string(),
                    price,
                    stock: 10,
                    review: None,
                    image: None,
                    is_new: true,
                    total_sold: 0,
                    user_id: owner.id,
                    created_at: now,
                    updated_at: now,
                    categories: None,
                },
            );
            state.links.insert((id, programming.id));
        }

        store
    }

    pub fn add_user(&self, username: &str, email: &str, role: &str) -> User {
        let mut state = self.state.write();
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            password: String::new(),
            role: role.to_string(),
            created_at: state.now(),
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub fn add_category(&self, name: &str) -> Category {
        let mut state = self.state.write();
        let category = Category {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.categories.insert(category.id, category.clone());
        category
    }

    /// Record a review of `book_id` by `user_id`.
    pub fn add_message(&self, book_id: i64, user_id: i64, message: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.books.contains_key(&book_id) || !state.users.contains_key(&user_id) {
            bail!("unknown book {book_id} or user {user_id}");
        }
        let id = state.next_id();
        let now = state.now();
        state.messages.insert(
            id,
            StoredMessage {
                id,
                book_id,
                user_id,
                message: message.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }
}

fn matches(predicate: &Predicate, book: &Book, category: Option<&Category>) -> bool {
    match predicate {
        Predicate::NameOrAuthorContains(needle) => {
            book.name.to_lowercase().contains(needle.as_str())
                || book.author.to_lowercase().contains(needle.as_str())
        }
        Predicate::IsNew(flag) => book.is_new == *flag,
        Predicate::PriceBetween { min, max } => {
            // Bounds are small integers; the conversion is exact in practice.
            book.price >= *min as f64 && book.price <= *max as f64
        }
        Predicate::CategoryIs(id) => category.is_some_and(|c| c.id == *id),
    }
}

fn compare(order: OrderClause, a: &Book, b: &Book) -> Ordering {
    let ordering = match order.key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Price => a.price.total_cmp(&b.price),
        SortKey::Stock => a.stock.cmp(&b.stock),
    };
    match order.direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_books(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let state = self.state.read();
        let predicates = filter.predicates();
        let mut rows: Vec<Book> = Vec::new();

        for book in state.books.values() {
            if filter.joins_categories() {
                let matched: Vec<Category> = state
                    .categories_of(book.id)
                    .into_iter()
                    .filter(|category| predicates.iter().all(|p| matches(p, book, Some(category))))
                    .collect();
                if !matched.is_empty() {
                    rows.push(Book {
                        categories: Some(matched),
                        ..book.clone()
                    });
                }
            } else if predicates.iter().all(|p| matches(p, book, None)) {
                rows.push(book.clone());
            }
        }

        if let Some(order) = filter.order {
            rows.sort_by(|a, b| compare(order, a, b));
        }

        let offset = usize::try_from(filter.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = filter
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn best_sellers(&self, take: u64) -> Result<Vec<Book>> {
        let state = self.state.read();
        let mut books: Vec<Book> = state.books.values().cloned().collect();
        books.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
        books.truncate(usize::try_from(take).unwrap_or(usize::MAX));
        Ok(books)
    }

    async fn find_book(&self, id: i64) -> Result<Option<Book>> {
        Ok(self.state.read().books.get(&id).cloned())
    }

    async fn book_details(&self, id: i64) -> Result<Option<BookDetails>> {
        let state = self.state.read();
        let Some(book) = state.books.get(&id) else {
            return Ok(None);
        };

        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|message| message.book_id == id)
            .map(|message| Message {
                id: message.id,
                message: message.message.clone(),
                created_at: message.created_at,
                updated_at: message.updated_at,
                user: UserSummary {
                    id: message.user_id,
                    username: state
                        .users
                        .get(&message.user_id)
                        .map(|user| user.username.clone())
                        .unwrap_or_default(),
                },
            })
            .collect();
        messages.sort_by_key(|message| message.created_at);

        let metadata = state
            .metadata
            .values()
            .find(|metadata| metadata.book.id == id)
            .cloned();

        Ok(Some(BookDetails {
            book: Book {
                categories: Some(state.categories_of(id)),
                ..book.clone()
            },
            messages,
            metadata,
        }))
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let mut state = self.state.write();
        if !state.users.contains_key(&book.user_id) {
            bail!("user {} does not exist", book.user_id);
        }

        let id = state.next_id();
        let now = state.now();
        let row = Book {
            id,
            name: book.name,
            author: book.author,
            price: book.price,
            stock: book.stock,
            review: book.review,
            image: None,
            is_new: book.is_new,
            total_sold: 0,
            user_id: book.user_id,
            created_at: now,
            updated_at: now,
            categories: None,
        };
        state.books.insert(id, row.clone());
        state.replace_links(id, &book.categories);

        Ok(Book {
            categories: Some(state.categories_of(id)),
            ..row
        })
    }

    async fn save_book(&self, book: &Book) -> Result<Book> {
        let mut state = self.state.write();
        if !state.books.contains_key(&book.id) {
            bail!("book {} does not exist", book.id);
        }

        let now = state.now();
        let row = Book {
            updated_at: now,
            categories: None,
            ..book.clone()
        };
        state.books.insert(book.id, row.clone());

        let categories = match &book.categories {
            Some(categories) => {
                state.replace_links(book.id, categories);
                Some(state.categories_of(book.id))
            }
            None => None,
        };

        Ok(Book { categories, ..row })
    }

    async fn delete_book(&self, id: i64) -> Result<u64> {
        let mut state = self.state.write();
        if state.books.remove(&id).is_none() {
            return Ok(0);
        }
        state.links.retain(|(book_id, _)| *book_id != id);
        state.messages.retain(|_, message| message.book_id != id);
        state.metadata.retain(|_, metadata| metadata.book.id != id);
        Ok(1)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>> {
        let state = self.state.read();
        Ok(state
            .categories
            .values()
            .filter(|category| ids.contains(&category.id))
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.state.read().categories.values().cloned().collect())
    }

    async fn category_with_books(&self, id: i64) -> Result<Option<CategoryWithBooks>> {
        let state = self.state.read();
        let Some(category) = state.categories.get(&id) else {
            return Ok(None);
        };

        let books = state
            .links
            .iter()
            .filter(|(_, category_id)| *category_id == id)
            .filter_map(|(book_id, _)| state.books.get(book_id).cloned())
            .collect();

        Ok(Some(CategoryWithBooks {
            category: category.clone(),
            books,
        }))
    }

    async fn find_metadata(&self, id: i64) -> Result<Option<Metadata>> {
        Ok(self.state.read().metadata.get(&id).cloned())
    }

    async fn insert_metadata(&self, metadata: NewMetadata) -> Result<Metadata> {
        let mut state = self.state.write();
        if !state.books.contains_key(&metadata.book_id) {
            bail!("book {} does not exist", metadata.book_id);
        }
        if state
            .metadata
            .values()
            .any(|existing| existing.book.id == metadata.book_id)
        {
            return Err(MetadataExists(metadata.book_id).into());
        }

        let row = Metadata {
            id: state.next_id(),
            pages: metadata.pages,
            publisher: metadata.publisher,
            language: metadata.language,
            book: BookRef {
                id: metadata.book_id,
            },
        };
        state.metadata.insert(row.id, row.clone());
        Ok(row)
    }

    async fn save_metadata(&self, metadata: &Metadata) -> Result<Metadata> {
        let mut state = self.state.write();
        match state.metadata.get_mut(&metadata.id) {
            Some(row) => {
                *row = metadata.clone();
                Ok(row.clone())
            }
            None => bail!("metadata {} does not exist", metadata.id),
        }
    }

    async fn delete_metadata(&self, id: i64) -> Result<u64> {
        Ok(u64::from(self.state.write().metadata.remove(&id).is_some()))
    }

    async fn healthy(&self) -> bool {
        true
    }
}
