//! mresearch - Market Research AI client
//!
#![doc = "mresearch - Market Research AI client"]
#![doc = "Main entry point for the mresearch command-line client."]

use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mresearch::cli::{Cli, Commands};
use mresearch::commands::{self, Context};
use mresearch::config::Config;
use mresearch::error::Result;
use mresearch::storage::LocalStore;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::debug!("Command failed: {:#}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let mut config = Config::load(config_path, &cli)?;

    let storage = LocalStore::open(config.storage.path.as_deref())?;
    tracing::debug!("Using local store at {}", storage.path().display());

    let preferences = storage.preferences()?;
    config.apply_saved_api_url(preferences.api_url.as_deref(), &cli);

    // Validate configuration
    config.validate()?;

    // Settings never touch the service
    if let Commands::Settings { command } = cli.command {
        return commands::settings::handle_settings(&storage, command);
    }

    let ctx = Context::new(config, storage)?;

    match cli.command {
        Commands::Research { command } => {
            tracing::info!("Starting research command");
            commands::research::handle_research(&ctx, command).await
        }
        Commands::Reports { command } => commands::reports::handle_reports(&ctx, command).await,
        Commands::Knowledge { command } => {
            tracing::info!("Starting knowledge command");
            commands::knowledge::handle_knowledge(&ctx, command).await
        }
        Commands::Analytics { command } => commands::analytics::handle_analytics(&ctx, command),
        Commands::Health => commands::health::check_health(&ctx).await,
        Commands::Settings { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "mresearch=debug"
    } else {
        "mresearch=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
