use std::sync::Arc;

use axum::extract::FromRef;
use bookstore_authz::TokenVerifier;

use crate::images::ImageHost;
use crate::modules::book::service::BookService;
use crate::modules::metadata::service::MetadataService;
use crate::store::Store;

/// Shared handler state, cloned into every module router.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub books: BookService,
    pub metadata: MetadataService,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        images: Arc<dyn ImageHost>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            books: BookService::new(store.clone(), images),
            metadata: MetadataService::new(store.clone()),
            store,
            verifier,
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}
