use std::sync::Arc;

use bookstore_authz::Identity;
use serde::Deserialize;

use super::models::{Metadata, NewMetadata};
use crate::error::{FieldError, ServiceError, ServiceResult};
use crate::modules::book::models::DeleteResult;
use crate::store::{MetadataExists, Store};

/// The book a metadata payload points at: a bare id, the id as a string (as
/// taken from a client route) or an object with an id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BookReference {
    Id(i64),
    Text(String),
    Object { id: i64 },
}

impl BookReference {
    /// `None` when a textual reference is not an integer.
    pub fn id(&self) -> Option<i64> {
        match self {
            BookReference::Id(id) | BookReference::Object { id } => Some(*id),
            BookReference::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataPayload {
    pub pages: Option<i64>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub book: Option<BookReference>,
}

#[derive(Clone)]
pub struct MetadataService {
    store: Arc<dyn Store>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        payload: MetadataPayload,
        requester: &Identity,
    ) -> ServiceResult<Metadata> {
        let mut errors = Vec::new();
        let pages = match payload.pages {
            Some(pages) => valid_pages(&mut errors, pages),
            None => missing(&mut errors, "pages"),
        };
        let publisher = match payload.publisher {
            Some(publisher) => non_empty(&mut errors, "publisher", publisher),
            None => missing(&mut errors, "publisher"),
        };
        let language = match payload.language {
            Some(language) => non_empty(&mut errors, "language", language),
            None => missing(&mut errors, "language"),
        };
        let book = match payload.book {
            Some(book) => book.id().or_else(|| {
                errors.push(FieldError::new("book", "must be a book id"));
                None
            }),
            None => missing(&mut errors, "book"),
        };

        let (Some(pages), Some(publisher), Some(language), Some(book_id)) =
            (pages, publisher, language, book)
        else {
            return Err(ServiceError::Validation(errors));
        };

        self.check_owner(book_id, requester).await?;

        // The store enforces one row per book atomically.
        let metadata = self
            .store
            .insert_metadata(NewMetadata {
                pages,
                publisher,
                language,
                book_id,
            })
            .await
            .map_err(|err| {
                if err.is::<MetadataExists>() {
                    ServiceError::Conflict("book already has metadata")
                } else {
                    ServiceError::Store(err)
                }
            })?;
        tracing::info!(metadata_id = metadata.id, book_id, "metadata created");
        Ok(metadata)
    }

    pub async fn update(
        &self,
        id: i64,
        payload: MetadataPayload,
        requester: &Identity,
    ) -> ServiceResult<Metadata> {
        let mut errors = Vec::new();
        let pages = payload.pages.and_then(|pages| valid_pages(&mut errors, pages));
        let publisher = payload
            .publisher
            .and_then(|publisher| non_empty(&mut errors, "publisher", publisher));
        let language = payload
            .language
            .and_then(|language| non_empty(&mut errors, "language", language));
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let mut metadata = self.find(id).await?;
        self.check_owner(metadata.book.id, requester).await?;

        if let Some(pages) = pages {
            metadata.pages = pages;
        }
        if let Some(publisher) = publisher {
            metadata.publisher = publisher;
        }
        if let Some(language) = language {
            metadata.language = language;
        }

        Ok(self.store.save_metadata(&metadata).await?)
    }

    pub async fn delete(&self, id: i64, requester: &Identity) -> ServiceResult<DeleteResult> {
        let metadata = self.find(id).await?;
        self.check_owner(metadata.book.id, requester).await?;

        let affected = self.store.delete_metadata(id).await?;
        Ok(DeleteResult { affected })
    }

    async fn find(&self, id: i64) -> ServiceResult<Metadata> {
        self.store
            .find_metadata(id)
            .await?
            .ok_or(ServiceError::NotFound("metadata not found"))
    }

    async fn check_owner(&self, book_id: i64, requester: &Identity) -> ServiceResult<()> {
        let book = self
            .store
            .find_book(book_id)
            .await?
            .ok_or(ServiceError::NotFound("book not found"))?;
        if requester.owns(book.user_id) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("You are not owner of this book"))
        }
    }
}

fn missing<T>(errors: &mut Vec<FieldError>, field: &'static str) -> Option<T> {
    errors.push(FieldError::new(field, "is required"));
    None
}

fn valid_pages(errors: &mut Vec<FieldError>, pages: i64) -> Option<i32> {
    match i32::try_from(pages) {
        Ok(pages) if pages > 0 => Some(pages),
        _ => {
            errors.push(FieldError::new("pages", "must be a positive integer"));
            None
        }
    }
}

fn non_empty(errors: &mut Vec<FieldError>, field: &'static str, value: String) -> Option<String> {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "should not be empty"));
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::book::models::NewBook;
    use crate::store::MemoryStore;
    use bookstore_authz::Role;

    async fn setup() -> (MetadataService, Identity, i64) {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("ana", "ana@example.com", "user");
        let book = store
            .insert_book(NewBook {
                name: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                price: 10.0,
                stock: 1,
                review: None,
                is_new: false,
                user_id: user.id,
                categories: Vec::new(),
            })
            .await
            .unwrap();
        let owner = Identity {
            id: user.id,
            username: user.username,
            role: Role::User,
        };
        (MetadataService::new(store), owner, book.id)
    }

    fn payload(book: i64) -> MetadataPayload {
        MetadataPayload {
            pages: Some(412),
            publisher: Some("Chilton".to_string()),
            language: Some("en".to_string()),
            book: Some(BookReference::Id(book)),
        }
    }

    #[tokio::test]
    async fn second_metadata_for_a_book_conflicts() {
        let (service, owner, book) = setup().await;
        service.create(payload(book), &owner).await.unwrap();
        let err = service.create(payload(book), &owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_book_owner_may_edit() {
        let (service, owner, book) = setup().await;
        let metadata = service.create(payload(book), &owner).await.unwrap();
        let other = Identity {
            id: owner.id + 100,
            username: "eve".to_string(),
            role: Role::User,
        };

        let err = service
            .update(metadata.id, MetadataPayload::default(), &other)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = service.delete(metadata.id, &other).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn invalid_payload_lists_every_field() {
        let (service, owner, _) = setup().await;
        let err = service
            .create(
                MetadataPayload {
                    pages: Some(0),
                    publisher: Some(" ".to_string()),
                    ..MetadataPayload::default()
                },
                &owner,
            )
            .await
            .unwrap_err();

        let ServiceError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["pages", "publisher", "language", "book"]);
    }

    #[test]
    fn book_reference_accepts_id_string_or_object() {
        let parse = |raw: &str| serde_json::from_str::<BookReference>(raw).unwrap().id();

        assert_eq!(parse("3"), Some(3));
        assert_eq!(parse(r#""3""#), Some(3));
        assert_eq!(parse(r#"{"id":3}"#), Some(3));
        assert_eq!(parse(r#""three""#), None);
    }

    #[tokio::test]
    async fn string_book_id_is_accepted() {
        let (service, owner, book) = setup().await;
        let metadata = service
            .create(
                MetadataPayload {
                    book: Some(BookReference::Text(book.to_string())),
                    ..payload(book)
                },
                &owner,
            )
            .await
            .unwrap();
        assert_eq!(metadata.book.id, book);
    }

    #[tokio::test]
    async fn non_numeric_book_id_is_a_field_error() {
        let (service, owner, book) = setup().await;
        let err = service
            .create(
                MetadataPayload {
                    book: Some(BookReference::Text("dune".to_string())),
                    ..payload(book)
                },
                &owner,
            )
            .await
            .unwrap_err();

        let ServiceError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields, vec![FieldError::new("book", "must be a book id")]);
    }
}
