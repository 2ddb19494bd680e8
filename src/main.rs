use anyhow::Result;
use clap::{Parser, Subcommand};
use storefront_core::{config::Config, migration, server, telemetry};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "storefront-core", version, about = "Storefront backend service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Do not apply pending migrations on startup
        #[arg(long)]
        skip_migrations: bool,
    },
    /// Create the database if needed and apply migrations, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Serve {
        skip_migrations: false,
    }) {
        Command::Migrate => migration::run_migrations(&config).await,
        Command::Serve { skip_migrations } => {
            info!("Starting Storefront Core Service");

            if !skip_migrations {
                if let Err(e) = migration::run_migrations(&config).await {
                    warn!(error = %e, "Migrations failed, starting anyway");
                }
            }

            server::run(config, prometheus_handle).await
        }
    }
}
