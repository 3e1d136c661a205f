//! PostgreSQL pool factory and the migration runner for module migrations.

use anyhow::{Context, Result};
use bookstore_kernel::{settings::DatabaseSettings, Migration};
use sqlx::postgres::{PgPool, PgPoolOptions};

const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    module      TEXT        NOT NULL,
    id          TEXT        NOT NULL,
    applied_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (module, id)
)
"#;

/// Create a PostgreSQL connection pool.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.url)
        .await
        .context("failed to connect to PostgreSQL")?;

    tracing::info!(
        target: "bookstore-db",
        max_connections = settings.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its ledger row.
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &PgPool, migrations: &[(String, Migration)]) -> Result<usize> {
    sqlx::raw_sql(LEDGER_DDL)
        .execute(pool)
        .await
        .context("failed to create schema_migrations")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let (already,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE module = $1 AND id = $2)",
        )
        .bind(module)
        .bind(migration.id)
        .fetch_one(pool)
        .await
        .context("failed to read schema_migrations")?;

        if already {
            tracing::debug!(target: "bookstore-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open migration transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {module}/{} failed", migration.id))?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES ($1, $2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .context("failed to record migration")?;
        tx.commit().await.context("failed to commit migration")?;

        tracing::info!(target: "bookstore-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
