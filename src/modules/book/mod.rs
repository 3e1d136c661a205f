pub mod models;
pub mod query;
pub mod routes;
pub mod service;
pub mod validation;

use async_trait::async_trait;
use axum::Router;
use bookstore_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

/// Book listing, lookup and owner-restricted mutation.
pub struct BookModule {
    state: AppState,
}

impl BookModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BookModule {
    fn name(&self) -> &'static str {
        "book"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = ?ctx.settings.database.backend,
            "book module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_books",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id          BIGSERIAL PRIMARY KEY,
                    username    TEXT NOT NULL UNIQUE,
                    email       TEXT NOT NULL UNIQUE,
                    password    TEXT NOT NULL,
                    role        TEXT NOT NULL DEFAULT 'user',
                    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE TABLE IF NOT EXISTS categories (
                    id    BIGSERIAL PRIMARY KEY,
                    name  TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS books (
                    id          BIGSERIAL PRIMARY KEY,
                    name        TEXT NOT NULL,
                    author      TEXT NOT NULL,
                    price       DOUBLE PRECISION NOT NULL,
                    stock       INTEGER NOT NULL,
                    review      TEXT,
                    image       TEXT,
                    is_new      BOOLEAN NOT NULL DEFAULT FALSE,
                    total_sold  INTEGER NOT NULL DEFAULT 0,
                    user_id     BIGINT NOT NULL REFERENCES users (id),
                    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS books_created_at_idx ON books (created_at);
                CREATE INDEX IF NOT EXISTS books_total_sold_idx ON books (total_sold);
                CREATE TABLE IF NOT EXISTS book_categories (
                    book_id      BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    category_id  BIGINT NOT NULL REFERENCES categories (id) ON DELETE CASCADE,
                    PRIMARY KEY (book_id, category_id)
                );
                CREATE TABLE IF NOT EXISTS messages (
                    id          BIGSERIAL PRIMARY KEY,
                    message     TEXT NOT NULL,
                    book_id     BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    user_id     BIGINT NOT NULL REFERENCES users (id),
                    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                );
            "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "book module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "book module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn openapi() -> serde_json::Value {
    let book_list = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Book" } });
    let id_param = json!({
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "integer", "format": "int64" }
    });
    let listing_params = json!([
        { "name": "search", "in": "query", "schema": { "type": "string" } },
        { "name": "minPrice", "in": "query", "schema": { "type": "string" } },
        { "name": "maxPrice", "in": "query", "schema": { "type": "string" } },
        {
            "name": "order", "in": "query",
            "schema": { "type": "string", "enum": ["price%ASC", "price%DESC", "stock", "new"] }
        },
        { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 50 } },
        { "name": "skip", "in": "query", "schema": { "type": "integer" } }
    ]);

    let mut paths = serde_json::Map::new();
    paths.insert(
        "/".to_string(),
        json!({
            "get": {
                "summary": "List books",
                "tags": ["Books"],
                "parameters": listing_params,
                "responses": { "200": json_response("Books", book_list.clone()) }
            },
            "post": {
                "summary": "Create a book owned by the caller",
                "tags": ["Books"],
                "security": [{ "bearer": [] }],
                "requestBody": {
                    "required": true,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/CreateBook" }
                        }
                    }
                },
                "responses": {
                    "201": json_response("Created book", json!({ "$ref": "#/components/schemas/Book" })),
                    "401": error_response("Missing token or unregistered user"),
                    "422": error_response("Validation error")
                }
            }
        }),
    );
    paths.insert(
        "/category/{cat}".to_string(),
        json!({
            "get": {
                "summary": "List books of a category",
                "tags": ["Books"],
                "parameters": [{
                    "name": "cat", "in": "path", "required": true,
                    "schema": { "type": "string" }
                }],
                "responses": {
                    "200": json_response("Books of the category", json!({
                        "type": "object",
                        "properties": { "cat": { "type": "string" }, "books": book_list.clone() }
                    })),
                    "422": error_response("No category id in path")
                }
            }
        }),
    );
    paths.insert(
        "/bestsellers".to_string(),
        json!({
            "get": {
                "summary": "Best-selling books",
                "tags": ["Books"],
                "parameters": [{
                    "name": "take", "in": "query",
                    "schema": { "type": "integer", "default": 100 }
                }],
                "responses": { "200": json_response("Books by sales", book_list) }
            }
        }),
    );
    paths.insert(
        "/upload/{id}".to_string(),
        json!({
            "post": {
                "summary": "Upload a cover image",
                "tags": ["Books"],
                "security": [{ "bearer": [] }],
                "parameters": [id_param.clone()],
                "requestBody": {
                    "content": {
                        "multipart/form-data": {
                            "schema": {
                                "type": "object",
                                "properties": { "file": { "type": "string", "format": "binary" } }
                            }
                        }
                    }
                },
                "responses": {
                    "200": json_response("Updated book, or null when the upload failed", json!({
                        "oneOf": [{ "$ref": "#/components/schemas/Book" }, { "type": "null" }]
                    }))
                }
            }
        }),
    );
    paths.insert(
        "/{id}".to_string(),
        json!({
            "get": {
                "summary": "Book with categories, reviews and metadata",
                "tags": ["Books"],
                "parameters": [id_param.clone()],
                "responses": {
                    "200": json_response("Book", json!({ "$ref": "#/components/schemas/Book" })),
                    "404": error_response("Book not found")
                }
            },
            "put": {
                "summary": "Update a book",
                "tags": ["Books"],
                "security": [{ "bearer": [] }],
                "parameters": [id_param.clone()],
                "requestBody": {
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/CreateBook" }
                        }
                    }
                },
                "responses": {
                    "200": json_response("Updated book", json!({ "$ref": "#/components/schemas/Book" })),
                    "403": error_response("Caller does not own the book"),
                    "404": error_response("Book not found"),
                    "422": error_response("Validation error")
                }
            },
            "delete": {
                "summary": "Delete a book",
                "tags": ["Books"],
                "security": [{ "bearer": [] }],
                "parameters": [id_param],
                "responses": {
                    "200": json_response("Rows removed", json!({
                        "type": "object",
                        "properties": { "affected": { "type": "integer" } }
                    })),
                    "403": error_response("Caller does not own the book"),
                    "404": error_response("Book not found")
                }
            }
        }),
    );

    json!({
        "paths": paths,
        "components": {
            "schemas": {
                "Category": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "name": { "type": "string" }
                    },
                    "required": ["id", "name"]
                },
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "name": { "type": "string" },
                        "author": { "type": "string" },
                        "price": { "type": "number" },
                        "stock": { "type": "integer" },
                        "review": { "type": ["string", "null"] },
                        "image": { "type": ["string", "null"] },
                        "isNew": { "type": "boolean" },
                        "totalSold": { "type": "integer" },
                        "userId": { "type": "integer", "format": "int64" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" },
                        "categories": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/Category" }
                        }
                    },
                    "required": ["id", "name", "author", "price", "stock", "isNew", "totalSold", "userId"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "review": { "type": "string" },
                        "author": { "type": "string" },
                        "price": { "type": "number", "exclusiveMinimum": 0 },
                        "stock": { "type": "integer", "minimum": 1 },
                        "categories": { "type": "array", "items": { "type": "integer" }, "minItems": 1 },
                        "user": { "type": "integer" },
                        "isNew": { "type": "boolean" }
                    },
                    "required": ["name", "author", "price", "stock", "categories", "user"]
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_fragment_documents_every_route() {
        let spec = openapi();
        let paths = spec["paths"].as_object().unwrap();
        for path in ["/", "/category/{cat}", "/bestsellers", "/upload/{id}", "/{id}"] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(spec["components"]["schemas"]["Book"].is_object());
    }
}
