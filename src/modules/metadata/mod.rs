pub mod models;
pub mod service;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Router,
};
use bookstore_authz::AuthUser;
use bookstore_http::{
    extract::{Json, Path},
    AppResult,
};
use bookstore_kernel::{Migration, Module};
use serde_json::json;

use crate::modules::book::models::DeleteResult;
use crate::state::AppState;
use models::Metadata;
use service::MetadataPayload;

/// Publishing details attached one-to-one to a book.
pub struct MetadataModule {
    state: AppState,
}

impl MetadataModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for MetadataModule {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(create_metadata))
            .route("/{id}", put(update_metadata).delete(delete_metadata))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let metadata = json!({
            "description": "Metadata",
            "content": {
                "application/json": { "schema": { "$ref": "#/components/schemas/Metadata" } }
            }
        });
        let id_param = json!([{
            "name": "id", "in": "path", "required": true,
            "schema": { "type": "integer", "format": "int64" }
        }]);

        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Attach metadata to a book",
                        "tags": ["Metadata"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "201": metadata.clone(),
                            "403": error("Caller does not own the book"),
                            "404": error("Book not found"),
                            "409": error("Book already has metadata"),
                            "422": error("Validation error")
                        }
                    }
                },
                "/{id}": {
                    "put": {
                        "summary": "Update metadata",
                        "tags": ["Metadata"],
                        "security": [{ "bearer": [] }],
                        "parameters": id_param.clone(),
                        "responses": {
                            "200": metadata,
                            "403": error("Caller does not own the book"),
                            "404": error("Metadata not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete metadata",
                        "tags": ["Metadata"],
                        "security": [{ "bearer": [] }],
                        "parameters": id_param,
                        "responses": {
                            "200": { "description": "Rows removed" },
                            "403": error("Caller does not own the book"),
                            "404": error("Metadata not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Metadata": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int64" },
                            "pages": { "type": "integer" },
                            "publisher": { "type": "string" },
                            "language": { "type": "string" },
                            "book": {
                                "type": "object",
                                "properties": { "id": { "type": "integer", "format": "int64" } }
                            }
                        },
                        "required": ["id", "pages", "publisher", "language", "book"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_metadata",
            up: r#"
                CREATE TABLE IF NOT EXISTS metadata (
                    id         BIGSERIAL PRIMARY KEY,
                    pages      INTEGER NOT NULL,
                    publisher  TEXT NOT NULL,
                    language   TEXT NOT NULL,
                    book_id    BIGINT NOT NULL UNIQUE REFERENCES books (id) ON DELETE CASCADE
                );
            "#,
        }]
    }
}

async fn create_metadata(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<MetadataPayload>,
) -> AppResult<(StatusCode, Json<Metadata>)> {
    let metadata = state.metadata.create(payload, &identity).await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

async fn update_metadata(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<MetadataPayload>,
) -> AppResult<Json<Metadata>> {
    Ok(Json(state.metadata.update(id, payload, &identity).await?))
}

async fn delete_metadata(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResult>> {
    Ok(Json(state.metadata.delete(id, &identity).await?))
}
