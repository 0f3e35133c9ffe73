use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use spiketrace::cli::seed::SeedOptions;
use spiketrace::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spiketrace")]
#[command(about = "Demo-data seeder for carbon-aware incident triage", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one correlated batch and write it to the sink
    Seed {
        /// Random seed; overrides generator.seed
        #[arg(long)]
        seed: Option<u64>,

        /// Scenario anchor (RFC 3339); defaults to now plus base_offset_minutes
        #[arg(long)]
        base_time: Option<DateTime<Utc>>,

        /// Generate and report counts without writing
        #[arg(long)]
        dry_run: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spiketrace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Seed {
            seed,
            base_time,
            dry_run,
        }) => {
            let options = SeedOptions {
                seed,
                base_time,
                dry_run,
            };
            spiketrace::cli::seed::seed(config_path.as_deref(), options).await?;
        }
        None => {
            // Default behavior is to seed
            spiketrace::cli::seed::seed(config_path.as_deref(), SeedOptions::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                spiketrace::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                spiketrace::cli::config::validate(config_path.as_deref())?;
            }
        },
    }

    Ok(())
}
