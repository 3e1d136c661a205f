//! Kernel of the bookstore backend: layered settings, the `Module` trait
//! every feature implements, and the registry that drives module lifecycles.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
