// ABOUTME: CLI entry point for db-transfer
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use db_transfer::commands;

#[derive(Parser)]
#[command(name = "db-transfer")]
#[command(about = "Resumable transfer of the local SQLite database to MySQL", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a destination database is reachable and list its tables
    TestConnection {
        #[arg(long)]
        target: String,
    },
    /// Start a transfer, or resume the previous one
    Start {
        #[arg(long)]
        target: String,
        /// Local SQLite database (defaults to $DATABASE_PATH or app.db)
        #[arg(long)]
        source: Option<String>,
        /// Rows per batch (1-10000)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Discard saved progress and start over
        #[arg(long)]
        reset: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show saved transfer progress
    Status {
        #[arg(long)]
        source: Option<String>,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard saved transfer progress
    Reset {
        #[arg(long)]
        source: Option<String>,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Serve the transfer API as line-delimited JSON on stdin/stdout
    Bridge {
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set.
    // Logs go to stderr so stdout stays clean for the bridge protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::TestConnection { target } => {
            commands::test_connection(&target, config.connect_retries()).await?;
            Ok(())
        }
        Commands::Start {
            target,
            source,
            batch_size,
            reset,
            yes,
        } => {
            if batch_size.is_some() {
                config.transfer.batch_size = batch_size;
                config.validate()?;
            }
            let source_path = config.source_path(source.as_deref());
            let controller = commands::build_controller(&config, &source_path)?;
            commands::start(controller, &target, reset, yes).await
        }
        Commands::Status { source, json } => {
            let source_path = config.source_path(source.as_deref());
            let checkpoints = commands::open_checkpoints(&config, &source_path)?;
            commands::status(checkpoints.as_ref(), json)
        }
        Commands::Reset { source, yes } => {
            let source_path = config.source_path(source.as_deref());
            let checkpoints = commands::open_checkpoints(&config, &source_path)?;
            commands::reset(checkpoints.as_ref(), yes)
        }
        Commands::Bridge { source } => {
            let source_path = config.source_path(source.as_deref());
            let controller = commands::build_controller(&config, &source_path)?;
            commands::bridge(controller).await
        }
    }
}
