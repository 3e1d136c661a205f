#![allow(dead_code)]

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bookstore_app::images::ImageHost;
use bookstore_app::modules::book::models::{Book, Category, NewBook, User};
use bookstore_app::store::{MemoryStore, Store};
use bookstore_app::App;
use bookstore_authz::{Identity, Role, TokenVerifier};
use bookstore_kernel::settings::Settings;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

/// Image host that records calls instead of talking to a provider.
#[derive(Default)]
pub struct RecordingImageHost {
    pub uploads: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
    pub fail_uploads: Mutex<bool>,
}

#[async_trait]
impl ImageHost for RecordingImageHost {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> anyhow::Result<String> {
        if *self.fail_uploads.lock() {
            bail!("provider unavailable");
        }
        let mut uploads = self.uploads.lock();
        let url = format!(
            "https://images.test/{}/{}-{}",
            uploads.len() + 1,
            bytes.len(),
            filename
        );
        uploads.push(url.clone());
        Ok(url)
    }

    async fn destroy(&self, url: &str) -> anyhow::Result<()> {
        self.destroyed.lock().push(url.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub images: Arc<RecordingImageHost>,
    verifier: TokenVerifier,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(RecordingImageHost::default());
        let verifier = TokenVerifier::from_settings(&settings.auth);
        let app = App::with_store(settings, store.clone(), images.clone());

        Self {
            router: app.router(),
            store,
            images,
            verifier,
        }
    }

    pub fn user(&self, username: &str) -> User {
        self.store
            .add_user(username, &format!("{username}@example.com"), "user")
    }

    pub fn token(&self, user: &User) -> String {
        self.verifier
            .issue(&Identity {
                id: user.id,
                username: user.username.clone(),
                role: Role::User,
            })
            .unwrap()
    }

    pub fn category(&self, name: &str) -> Category {
        self.store.add_category(name)
    }

    /// Insert a book directly into the store.
    pub async fn book(&self, owner: &User, book: BookSeed<'_>) -> Book {
        let mut stored = self
            .store
            .insert_book(NewBook {
                name: book.name.to_string(),
                author: book.author.to_string(),
                price: book.price,
                stock: book.stock,
                review: None,
                is_new: book.is_new,
                user_id: owner.id,
                categories: book.categories.to_vec(),
            })
            .await
            .unwrap();

        if book.total_sold > 0 || book.image.is_some() {
            stored.total_sold = book.total_sold;
            stored.image = book.image.map(str::to_string);
            stored.categories = None;
            stored = self.store.save_book(&stored).await.unwrap();
        }
        stored
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        self.call(request).await
    }

    /// Multipart upload of `bytes` as field `file`.
    pub async fn upload(&self, uri: &str, token: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let boundary = "bookstore-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.call(request).await
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }
}

#[derive(Clone, Copy)]
pub struct BookSeed<'a> {
    pub name: &'a str,
    pub author: &'a str,
    pub price: f64,
    pub stock: i32,
    pub is_new: bool,
    pub total_sold: i32,
    pub image: Option<&'a str>,
    pub categories: &'a [Category],
}

impl Default for BookSeed<'_> {
    fn default() -> Self {
        Self {
            name: "Untitled",
            author: "Anonymous",
            price: 10.0,
            stock: 1,
            is_new: false,
            total_sold: 0,
            image: None,
            categories: &[],
        }
    }
}

/// `name` of every book in a JSON array.
pub fn names(books: &Value) -> Vec<String> {
    books
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["name"].as_str().unwrap().to_string())
        .collect()
}
