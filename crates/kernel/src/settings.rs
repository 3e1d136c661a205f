use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSTORE_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSTORE_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSTORE";

/// Secret shipped in the defaults; only acceptable outside production.
pub const DEV_JWT_SECRET: &str = "bookstore-dev-secret";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub images: ImageSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `BOOKSTORE_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .context("unable to resolve current directory")?,
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selected environment always wins over any `environment` key.
        settings.environment = parsed_environment;

        Ok(settings)
    }

    /// Reject combinations that would start a misconfigured server.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment == Environment::Production && self.auth.jwt_secret == DEV_JWT_SECRET {
            bail!("auth.jwt_secret must be set in production");
        }
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            bail!("database.url is required for the postgres backend");
        }
        if self.images.provider == ImageProvider::Cloudinary
            && (self.images.cloud_name.is_empty()
                || self.images.api_key.is_empty()
                || self.images.api_secret.is_empty())
        {
            bail!("images.cloud_name, images.api_key and images.api_secret are required for cloudinary");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Prefix every module is mounted under, e.g. `/api`.
    #[serde(default)]
    pub base_path: String,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            base_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_max_connections() -> u32 {
        10
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: String::new(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Directive used when `RUST_LOG` is not set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=debug,sqlx=warn".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "AuthSettings::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthSettings::default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl AuthSettings {
    fn default_jwt_secret() -> String {
        DEV_JWT_SECRET.to_string()
    }

    fn default_issuer() -> String {
        "bookstore".to_string()
    }

    fn default_token_ttl_secs() -> u64 {
        60 * 60 * 24
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: Self::default_jwt_secret(),
            issuer: Self::default_issuer(),
            token_ttl_secs: Self::default_token_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    #[default]
    Disabled,
    Cloudinary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    #[serde(default)]
    pub provider: ImageProvider,
    #[serde(default = "ImageSettings::default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "ImageSettings::default_folder")]
    pub folder: String,
}

impl ImageSettings {
    fn default_api_base() -> String {
        "https://api.cloudinary.com/v1_1".to_string()
    }

    fn default_folder() -> String {
        "bookstore".to_string()
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            provider: ImageProvider::default(),
            api_base: Self::default_api_base(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: Self::default_folder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_backend_is_memory() {
        let settings = Settings::default();
        assert_eq!(settings.database.backend, StorageBackend::Memory);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unknown_environment_is_rejected() {
        assert!("qa".parse::<Environment>().is_err());
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
    }

    #[test]
    fn production_requires_a_real_jwt_secret() {
        let mut settings = Settings {
            environment: Environment::Production,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        settings.auth.jwt_secret = "a-long-production-secret".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn postgres_backend_requires_url() {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Postgres;
        assert!(settings.validate().is_err());

        settings.database.url = "postgres://localhost/bookstore".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn load_from_layers_base_and_environment_files() {
        let dir = std::env::temp_dir().join(format!(
            "bookstore-settings-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.toml"),
            "[server]\nport = 9000\nbase_path = \"/api\"\n[database]\nmax_connections = 3\n",
        )
        .unwrap();
        std::fs::write(dir.join("staging.toml"), "[server]\nport = 9100\n").unwrap();

        let settings = Settings::load_from(&dir, "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.base_path, "/api");
        assert_eq!(settings.database.max_connections, 3);

        std::fs::remove_dir_all(&dir).ok();
    }
}
