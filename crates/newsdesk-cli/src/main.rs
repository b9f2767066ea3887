//! Newsdesk CLI - Operational commands
//!
//! Usage:
//!   newsdesk bootstrap
//!   newsdesk migrate
//!   newsdesk hash-password <password>
//!   newsdesk check-config

use clap::{Parser, Subcommand};
use newsdesk_api::auth::{password::hash_password, CredentialStore, PasswordConfig};
use newsdesk_api::bootstrap::{ensure_default_admin, BootstrapOutcome};
use newsdesk_core::config::AppConfig;
use newsdesk_core::StoreBackend;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "Newsdesk admin backend tooling")]
#[command(version)]
struct Cli {
    /// TOML configuration file (default: $NEWSDESK_CONFIG); environment
    /// variables override it
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured super admin if it does not exist
    Bootstrap,
    /// Apply database migrations
    Migrate,
    /// Print an Argon2id hash for a password
    HashPassword {
        /// Plaintext password
        password: String,
    },
    /// Load and validate the configuration
    CheckConfig,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let path = path.or_else(|| std::env::var_os("NEWSDESK_CONFIG").map(PathBuf::from));
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,newsdesk_api=info,newsdesk_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Bootstrap => {
            let store = newsdesk_core::store::open(&config.database).await?;
            let credentials = CredentialStore::new(store);
            let outcome = ensure_default_admin(
                &credentials,
                &config.bootstrap,
                PasswordConfig::from(&config.auth),
            )
            .await?;

            match outcome {
                BootstrapOutcome::Skipped => {
                    println!("Set BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD to create an admin")
                }
                BootstrapOutcome::AlreadyPresent { email } => {
                    println!("Account {email} already exists, nothing to do")
                }
                BootstrapOutcome::Created { email } => println!("Created super admin {email}"),
            }
        }
        Commands::Migrate => match config.database.backend {
            StoreBackend::Postgres => {
                // Opening the store applies pending migrations
                newsdesk_core::store::open(&config.database).await?;
                println!("Migrations applied");
            }
            StoreBackend::Memory => println!("In-memory backend has no schema to migrate"),
        },
        Commands::HashPassword { password } => {
            let hash = hash_password(password, PasswordConfig::from(&config.auth)).await?;
            println!("{hash}");
        }
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!("  environment:   {:?}", config.environment);
            println!("  listen:        {}:{}", config.server.host, config.server.port);
            println!("  store:         {:?}", config.database.backend);
            println!("  token ttl:     {}s", config.auth.token_expiration_secs);
            println!(
                "  lockout:       {} attempts, {}s",
                config.auth.max_failed_attempts, config.auth.lockout_duration_secs
            );
            println!(
                "  page size:     {} (max {})",
                config.query.default_limit, config.query.max_limit
            );
            println!(
                "  bootstrap:     {}",
                config.bootstrap.admin_email.as_deref().unwrap_or("not configured")
            );
        }
    }

    Ok(())
}
