use anyhow::Context;
use bookstore_app::App;
use bookstore_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        backend = ?settings.database.backend,
        "bookstore-app starting"
    );

    App::build(settings).await?.run().await
}
