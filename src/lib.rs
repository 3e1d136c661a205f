//! Bookstore backend: book listing and filtering, categories, owner-restricted
//! book and metadata mutation.

pub mod app;
pub mod error;
pub mod images;
pub mod modules;
pub mod state;
pub mod store;
pub mod utils;

pub use app::App;
pub use error::{FieldError, ServiceError, ServiceResult};
pub use state::AppState;
