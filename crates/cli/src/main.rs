use anyhow::Context;
use bookstore_app::App;
use bookstore_authz::{Identity, Role, TokenVerifier};
use bookstore_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Bookstore backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations and serve HTTP until ctrl-c / SIGTERM
    Serve,
    /// Apply pending PostgreSQL migrations and exit
    Migrate,
    /// Load and validate the configuration, then print a summary
    CheckConfig,
    /// Issue a bearer token for a user, for local testing
    IssueToken {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        admin: bool,
    },
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().context("failed to load bookstore settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let settings = load_settings()?;
            bookstore_telemetry::init(&settings.telemetry)?;
            App::build(settings).await?.run().await
        }
        Command::Migrate => {
            let settings = load_settings()?;
            bookstore_telemetry::init(&settings.telemetry)?;
            let applied = App::build(settings).await?.migrate().await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::CheckConfig => {
            let settings = load_settings()?;
            settings.validate()?;
            println!("environment: {:?}", settings.environment);
            println!(
                "server: {}:{} (base path {:?})",
                settings.server.host, settings.server.port, settings.server.base_path
            );
            println!("database: {:?}", settings.database.backend);
            println!("images: {:?}", settings.images.provider);
            Ok(())
        }
        Command::IssueToken {
            user_id,
            username,
            admin,
        } => {
            let settings = load_settings()?;
            let verifier = TokenVerifier::from_settings(&settings.auth);
            let token = verifier.issue(&Identity {
                id: user_id,
                username,
                role: if admin { Role::Admin } else { Role::User },
            })?;
            println!("{token}");
            Ok(())
        }
    }
}
