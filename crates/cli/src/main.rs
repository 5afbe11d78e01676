//! Cardgraph CLI
//!
//! Main entry point for the cardgraph command-line tool.
//! Builds nearest-neighbor tables over card embeddings and labels the
//! resulting edges with an OpenAI-compatible model.

mod commands;

use cardgraph_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{KnnCommand, LabelCommand};
use std::path::PathBuf;

/// Cardgraph - semantic relationship graphs over flashcards
#[derive(Parser, Debug)]
#[command(name = "cardgraph")]
#[command(about = "Semantic relationship graphs over flashcards", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CARDGRAPH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CARDGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Labeling provider base URL
    #[arg(long, global = true, env = "CARDGRAPH_BASE_URL")]
    base_url: Option<String>,

    /// Labeling model identifier
    #[arg(short, long, global = true, env = "CARDGRAPH_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build or load the KNN table and print neighbor lists
    Knn(KnnCommand),

    /// Build the neighbor graph and label its edges
    Label(LabelCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from the workspace the command will run in
    let config = AppConfig::load(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.base_url,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, cli.log_json)?;

    config.validate()?;

    // Log startup
    tracing::info!("Cardgraph CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Labeling endpoint: {}", config.labeling.base_url);
    tracing::debug!("Model: {}", config.labeling.model);

    // Ensure .cardgraph directory exists
    config.ensure_cardgraph_dir()?;

    let command_name = match &cli.command {
        Commands::Knn(_) => "knn",
        Commands::Label(_) => "label",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Knn(cmd) => cmd.execute(&config).await,
        Commands::Label(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
