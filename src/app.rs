//! Application wiring: storage backend, image host, modules and the server.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use bookstore_authz::TokenVerifier;
use bookstore_kernel::{
    settings::{Settings, StorageBackend},
    InitCtx, ModuleRegistry,
};
use sqlx::PgPool;

use crate::images::{self, ImageHost};
use crate::modules;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

pub struct App {
    pub settings: Settings,
    pub state: AppState,
    pub registry: ModuleRegistry,
    pool: Option<PgPool>,
}

impl App {
    /// Wire the application for `settings`, connecting to PostgreSQL when
    /// that backend is selected.
    pub async fn build(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let images = images::from_settings(&settings.images)?;
        let (store, pool): (Arc<dyn Store>, Option<PgPool>) = match settings.database.backend {
            StorageBackend::Memory => {
                tracing::warn!("using the in-memory store, data is lost on exit");
                (Arc::new(MemoryStore::seeded()), None)
            }
            StorageBackend::Postgres => {
                let pool = bookstore_db::connect(&settings.database).await?;
                (Arc::new(PgStore::new(pool.clone())), Some(pool))
            }
        };

        let mut app = Self::with_store(settings, store, images);
        app.pool = pool;
        Ok(app)
    }

    /// Wire the application around an existing store and image host.
    pub fn with_store(
        settings: Settings,
        store: Arc<dyn Store>,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        let verifier = Arc::new(TokenVerifier::from_settings(&settings.auth));
        let state = AppState::new(store, images, verifier);
        let registry = modules::registry(&state);

        Self {
            settings,
            state,
            registry,
            pool: None,
        }
    }

    pub fn router(&self) -> Router {
        let store = self.state.store.clone();
        let health = get(move || {
            let store = store.clone();
            async move {
                if store.healthy().await {
                    (StatusCode::OK, "ok")
                } else {
                    tracing::warn!("storage backend is not answering");
                    (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
                }
            }
        });
        bookstore_http::build_router(&self.registry, &self.settings, health)
    }

    /// Apply pending module migrations. The memory backend has none to run.
    pub async fn migrate(&self) -> Result<usize> {
        let Some(pool) = &self.pool else {
            tracing::info!("memory backend selected, skipping migrations");
            return Ok(0);
        };
        let applied =
            bookstore_db::run_migrations(pool, &self.registry.collect_migrations()).await?;
        tracing::info!(applied, "migrations complete");
        Ok(applied)
    }

    /// Run the module lifecycle around the HTTP server until shutdown.
    pub async fn run(self) -> Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };

        self.registry.init_all(&ctx).await?;
        self.migrate().await?;
        self.registry.start_all(&ctx).await?;

        let served = bookstore_http::start_server(self.router(), &self.settings).await;

        self.registry
            .stop_all()
            .await
            .context("failed to stop modules")?;
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        served
    }
}
