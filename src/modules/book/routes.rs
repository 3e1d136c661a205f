use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use bookstore_authz::AuthUser;
use bookstore_http::{
    extract::{Json, Path, Query},
    AppResult,
};
use serde::Deserialize;

use super::models::{Book, BookDetails, CategoryBooks, DeleteResult};
use super::query::{blank_as_none, BookQuery};
use super::service::Upload;
use super::validation::{CreateBookPayload, UpdateBookPayload};
use crate::state::AppState;

/// Largest accepted cover upload.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct BestSellersQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub take: Option<u64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/category/{cat}", get(books_by_category))
        .route("/bestsellers", get(best_sellers))
        .route(
            "/upload/{id}",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{id}", get(find_book).put(update_book).delete(delete_book))
        .with_state(state)
}

async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.books.list(&query).await?))
}

async fn books_by_category(
    State(state): State<AppState>,
    Path(cat): Path<String>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<CategoryBooks>> {
    Ok(Json(state.books.find_by_category(&cat, query).await?))
}

async fn best_sellers(
    State(state): State<AppState>,
    Query(query): Query<BestSellersQuery>,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.books.best_sellers(query.take).await?))
}

async fn find_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BookDetails>> {
    Ok(Json(state.books.find_one(id).await?))
}

async fn create_book(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateBookPayload>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.books.create(payload, &identity).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn upload_image(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<Option<Book>> {
    tracing::debug!(book_id = id, user = identity.id, "image upload");
    let file = match multipart {
        Ok(multipart) => read_file_field(multipart).await,
        Err(rejection) => {
            tracing::error!(error = %rejection, "upload is not a multipart body");
            None
        }
    };
    Json(state.books.upload(id, file).await)
}

/// First multipart field named `file`, if any.
async fn read_file_field(mut multipart: Multipart) -> Option<Upload> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                return match field.bytes().await {
                    Ok(bytes) => Some(Upload {
                        filename,
                        bytes: bytes.to_vec(),
                    }),
                    Err(err) => {
                        tracing::error!(error = %err, "failed to read uploaded file");
                        None
                    }
                };
            }
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(error = %err, "malformed multipart body");
                return None;
            }
        }
    }
}

async fn update_book(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBookPayload>,
) -> AppResult<Json<Book>> {
    Ok(Json(state.books.update(id, payload, &identity).await?))
}

async fn delete_book(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResult>> {
    Ok(Json(state.books.delete(id, &identity).await?))
}
