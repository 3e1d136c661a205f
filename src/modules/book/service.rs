use std::sync::Arc;

use bookstore_authz::Identity;

use super::models::{Book, BookDetails, CategoryBooks, DeleteResult, NewBook};
use super::query::{apply_query, BookFilter, BookQuery, Predicate};
use super::validation::{validate_create, validate_update, CreateBookPayload, UpdateBookPayload};
use crate::error::{FieldError, ServiceError, ServiceResult};
use crate::images::ImageHost;
use crate::store::Store;
use crate::utils::{drop_last_char, strip_non_digits};

/// `take` used by the best-seller listing when none (or zero) is given.
pub const DEFAULT_BEST_SELLERS: u64 = 100;

const NOT_FOUND: &str = "book not found";
const NOT_OWNER: &str = "You are not owner of this book";
const NOT_REGISTERED: &str = "Error, you need to be registered";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn Store>,
    images: Arc<dyn ImageHost>,
}

impl BookService {
    pub fn new(store: Arc<dyn Store>, images: Arc<dyn ImageHost>) -> Self {
        Self { store, images }
    }

    pub async fn list(&self, query: &BookQuery) -> ServiceResult<Vec<Book>> {
        let mut filter = BookFilter::new();
        apply_query(&mut filter, query);
        Ok(self.store.find_books(&filter).await?)
    }

    /// Books of the category whose id is made of the digits of `raw_cat`.
    pub async fn find_by_category(
        &self,
        raw_cat: &str,
        query: BookQuery,
    ) -> ServiceResult<CategoryBooks> {
        let digits = strip_non_digits(raw_cat);
        let id: i64 = digits.parse().map_err(|_| {
            ServiceError::Validation(vec![FieldError::new("cat", "must contain a category id")])
        })?;

        let mut query = query;
        query.clear_zero_price_range();

        let mut filter = BookFilter::joined_with_categories();
        filter.replace_where(Predicate::CategoryIs(id));
        apply_query(&mut filter, &query);

        let books = self.store.find_books(&filter).await?;
        Ok(CategoryBooks {
            cat: drop_last_char(raw_cat).to_string(),
            books,
        })
    }

    pub async fn best_sellers(&self, take: Option<u64>) -> ServiceResult<Vec<Book>> {
        let take = take.filter(|take| *take > 0).unwrap_or(DEFAULT_BEST_SELLERS);
        Ok(self.store.best_sellers(take).await?)
    }

    pub async fn find_one(&self, id: i64) -> ServiceResult<BookDetails> {
        self.store
            .book_details(id)
            .await?
            .ok_or(ServiceError::NotFound(NOT_FOUND))
    }

    pub async fn create(
        &self,
        payload: CreateBookPayload,
        requester: &Identity,
    ) -> ServiceResult<Book> {
        let input = validate_create(payload).map_err(ServiceError::Validation)?;

        let owner = self
            .store
            .find_user(requester.id)
            .await?
            .ok_or(ServiceError::Unauthorized(NOT_REGISTERED))?;
        if input.user != owner.id {
            tracing::debug!(
                declared = input.user,
                owner = owner.id,
                "declared owner differs from requester, using requester"
            );
        }

        let categories = self.store.find_categories(&input.categories).await?;
        let book = self
            .store
            .insert_book(NewBook {
                name: input.name,
                author: input.author,
                price: input.price,
                stock: input.stock,
                review: input.review,
                is_new: input.is_new,
                user_id: owner.id,
                categories,
            })
            .await?;

        tracing::info!(book_id = book.id, owner = owner.id, "book created");
        Ok(book)
    }

    /// Attach a freshly uploaded image to book `id`.
    ///
    /// Failures are logged and reported as `None`, never as an error.
    pub async fn upload(&self, id: i64, file: Option<Upload>) -> Option<Book> {
        match self.try_upload(id, file).await {
            Ok(book) => Some(book),
            Err(err) => {
                tracing::error!(book_id = id, error = %err, "image upload failed");
                None
            }
        }
    }

    async fn try_upload(&self, id: i64, file: Option<Upload>) -> anyhow::Result<Book> {
        let mut book = self
            .store
            .find_book(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("book {id} not found"))?;
        let file = file.ok_or_else(|| anyhow::anyhow!("no file in upload"))?;

        if let Some(old) = book.image.as_deref().filter(|image| image.starts_with('h')) {
            if let Err(err) = self.images.destroy(old).await {
                tracing::warn!(book_id = id, error = %err, "failed to destroy previous image");
            }
        }

        book.image = Some(self.images.upload(file.bytes, &file.filename).await?);
        self.store.save_book(&book).await
    }

    pub async fn update(
        &self,
        id: i64,
        payload: UpdateBookPayload,
        requester: &Identity,
    ) -> ServiceResult<Book> {
        let changes = validate_update(payload).map_err(ServiceError::Validation)?;

        let mut book = self
            .store
            .find_book(id)
            .await?
            .ok_or(ServiceError::NotFound(NOT_FOUND))?;
        if !requester.owns(book.user_id) {
            return Err(ServiceError::Forbidden(NOT_OWNER));
        }

        if let Some(ids) = &changes.categories {
            book.categories = Some(self.store.find_categories(ids).await?);
        }
        if let Some(name) = changes.name {
            book.name = name;
        }
        if let Some(author) = changes.author {
            book.author = author;
        }
        if let Some(review) = changes.review {
            book.review = Some(review);
        }
        if let Some(price) = changes.price {
            book.price = price;
        }
        if let Some(stock) = changes.stock {
            book.stock = stock;
        }
        if let Some(is_new) = changes.is_new {
            book.is_new = is_new;
        }

        Ok(self.store.save_book(&book).await?)
    }

    pub async fn delete(&self, id: i64, requester: &Identity) -> ServiceResult<DeleteResult> {
        let book = self
            .store
            .find_book(id)
            .await?
            .ok_or(ServiceError::NotFound(NOT_FOUND))?;

        // The image goes before ownership is checked.
        if let Some(image) = book.image.as_deref() {
            if let Err(err) = self.images.destroy(image).await {
                tracing::warn!(book_id = id, error = %err, "failed to destroy book image");
            }
        }

        if !requester.owns(book.user_id) {
            return Err(ServiceError::Forbidden(NOT_OWNER));
        }

        let affected = self.store.delete_book(id).await?;
        tracing::info!(book_id = id, affected, "book deleted");
        Ok(DeleteResult { affected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::DisabledImageHost;
    use crate::store::MemoryStore;
    use bookstore_authz::Role;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: BookService,
        owner: Identity,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("ana", "ana@example.com", "user");
        store.add_category("Fiction");
        let service = BookService::new(store.clone(), Arc::new(DisabledImageHost));
        Fixture {
            store,
            service,
            owner: Identity {
                id: user.id,
                username: user.username,
                role: Role::User,
            },
        }
    }

    fn payload(user: i64, categories: Vec<i64>) -> CreateBookPayload {
        CreateBookPayload {
            name: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            price: Some(10.0),
            stock: Some(2.0),
            categories: Some(categories),
            user: Some(user),
            ..CreateBookPayload::default()
        }
    }

    #[tokio::test]
    async fn create_uses_requester_as_owner() {
        let f = fixture();
        let categories = f.store.list_categories().await.unwrap();
        let book = f
            .service
            .create(payload(999, vec![categories[0].id]), &f.owner)
            .await
            .unwrap();

        assert_eq!(book.user_id, f.owner.id);
        assert_eq!(book.categories, Some(categories));
    }

    #[tokio::test]
    async fn create_by_unknown_user_is_unauthorized() {
        let f = fixture();
        let stranger = Identity {
            id: 4242,
            username: "ghost".to_string(),
            role: Role::User,
        };
        let err = f
            .service
            .create(payload(4242, vec![1]), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(NOT_REGISTERED)));
    }

    #[tokio::test]
    async fn category_without_digits_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .find_by_category("fiction", BookQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_failures_are_swallowed() {
        let f = fixture();
        let book = f
            .service
            .create(payload(f.owner.id, vec![2]), &f.owner)
            .await
            .unwrap();

        let upload = Upload {
            filename: "cover.png".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert!(f.service.upload(book.id, Some(upload.clone())).await.is_none());
        assert!(f.service.upload(9999, Some(upload)).await.is_none());
        assert!(f.service.upload(book.id, None).await.is_none());
    }

    #[tokio::test]
    async fn update_never_changes_owner() {
        let f = fixture();
        let book = f
            .service
            .create(payload(f.owner.id, vec![2]), &f.owner)
            .await
            .unwrap();

        let updated = f
            .service
            .update(
                book.id,
                UpdateBookPayload {
                    stock: Some(7.0),
                    user: Some(12345),
                    ..UpdateBookPayload::default()
                },
                &f.owner,
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 7);
        assert_eq!(updated.user_id, f.owner.id);
    }

    #[tokio::test]
    async fn best_sellers_zero_means_default() {
        let f = fixture();
        for _ in 0..3 {
            f.service
                .create(payload(f.owner.id, vec![2]), &f.owner)
                .await
                .unwrap();
        }
        assert_eq!(f.service.best_sellers(Some(0)).await.unwrap().len(), 3);
        assert_eq!(f.service.best_sellers(Some(2)).await.unwrap().len(), 2);
        assert_eq!(f.service.best_sellers(None).await.unwrap().len(), 3);
    }
}
