use async_trait::async_trait;
use axum::{extract::State, routing::get, Router};
use bookstore_http::{
    extract::{Json, Path},
    AppError, AppResult,
};
use bookstore_kernel::Module;
use serde_json::json;

use crate::modules::book::models::{Category, CategoryWithBooks};
use crate::state::AppState;

/// Read-only category listing. The tables belong to the book module.
pub struct CategoriesModule {
    state: AppState,
}

impl CategoriesModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for CategoriesModule {
    fn name(&self) -> &'static str {
        "categories"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_categories))
            .route("/{id}", get(get_category))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List categories",
                        "tags": ["Categories"],
                        "responses": {
                            "200": {
                                "description": "Categories ordered by id",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Category" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Category with its books",
                        "tags": ["Categories"],
                        "parameters": [{
                            "name": "id", "in": "path", "required": true,
                            "schema": { "type": "integer", "format": "int64" }
                        }],
                        "responses": {
                            "200": { "description": "Category and books" },
                            "404": {
                                "description": "Category not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
    }
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.store.list_categories().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CategoryWithBooks>> {
    state
        .store
        .category_with_books(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("category not found"))
}
