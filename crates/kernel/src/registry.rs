use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Module registry driving the lifecycle of every registered module
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module with the registry
    ///
    /// Registration order is lifecycle order: modules are initialized and
    /// started in this order, stopped in reverse.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Get all registered modules
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    /// Initialize every module in registration order
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Start every module in registration order
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in &self.modules {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop every module in reverse registration order
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        tracing::info!("stopping {} modules", self.modules.len());

        for module in self.modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            module
                .stop()
                .await
                .with_context(|| format!("failed to stop module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations, tagged with their owning module
    ///
    /// Modules later in the registry may reference tables created by earlier
    /// ones, so migrations keep registration order rather than being sorted.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        self.modules
            .iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(|migration| (module.name().to_string(), migration))
            })
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestModule {
        name: &'static str,
        started: AtomicUsize,
    }

    impl TestModule {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                started: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn migrations(&self) -> Vec<Migration> {
            vec![
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE test (id BIGINT);",
                },
                Migration {
                    id: "002_index",
                    up: "CREATE INDEX test_id ON test (id);",
                },
            ]
        }

        async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn migrations_keep_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule::new("zeta")));
        registry.register(Arc::new(TestModule::new("alpha")));

        let order: Vec<(String, &str)> = registry
            .collect_migrations()
            .into_iter()
            .map(|(module, migration)| (module, migration.id))
            .collect();

        assert_eq!(
            order,
            vec![
                ("zeta".to_string(), "001_init"),
                ("zeta".to_string(), "002_index"),
                ("alpha".to_string(), "001_init"),
                ("alpha".to_string(), "002_index"),
            ]
        );
    }

    #[test]
    fn get_module_by_name() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule::new("book")));

        assert!(registry.get_module("book").is_some());
        assert!(registry.get_module("orders").is_none());
    }

    #[tokio::test]
    async fn test_module_lifecycle() {
        let mut registry = ModuleRegistry::new();
        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };

        let test_module = Arc::new(TestModule::new("test"));
        registry.register(test_module.clone());

        registry.init_all(&ctx).await.unwrap();
        registry.start_all(&ctx).await.unwrap();
        registry.stop_all().await.unwrap();

        assert_eq!(test_module.started.load(Ordering::SeqCst), 1);
    }
}
