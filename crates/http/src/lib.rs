//! HTTP server facade with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::MethodRouter, Router};

use bookstore_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod extract;
pub mod router;

pub use error::{AppError, AppResult};
use router::RouterBuilder;

/// Serve `app` until ctrl-c / SIGTERM
pub async fn start_server(app: Router, settings: &Settings) -> anyhow::Result<()> {

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted and `health`
/// answering `/healthz`
pub fn build_router(
    registry: &ModuleRegistry,
    settings: &Settings,
    health: MethodRouter,
) -> Router {
    let base_path = settings.server.base_path.as_str();
    let mut router_builder = RouterBuilder::new().route("/healthz", health);

    for module in registry.modules() {
        tracing::info!(
            module = module.name(),
            "mounting module routes under {}",
            router::mount_path(base_path, module.name())
        );
        router_builder = router_builder.mount_module(base_path, module.name(), module.routes());
    }

    router_builder
        .with_openapi(registry, base_path)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .build()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
