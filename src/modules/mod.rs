pub mod book;
pub mod categories;
pub mod metadata;

use std::sync::Arc;

use bookstore_kernel::ModuleRegistry;

use crate::state::AppState;

/// Registry with every bookstore module. The book module goes first so that
/// its tables exist before the metadata migration references them.
pub fn registry(state: &AppState) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(book::BookModule::new(state.clone())));
    registry.register(Arc::new(categories::CategoriesModule::new(state.clone())));
    registry.register(Arc::new(metadata::MetadataModule::new(state.clone())));
    registry
}
