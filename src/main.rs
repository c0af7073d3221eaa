use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wen_archiver::config::resolve_config_path;

#[derive(Parser)]
#[command(name = "wen")]
#[command(about = "Cast archiver with pattern-gated batch summaries", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler (and web API if configured) until Ctrl+C
    Run,
    /// Run a single archive job
    Once {
        /// Post even if the window is not significant
        #[arg(long)]
        post: bool,
    },
    /// Show window statistics and significance without posting
    Patterns {
        #[arg(long)]
        hours: Option<u64>,
    },
    /// Print archive totals and recent batches
    Stats,
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
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wen_archiver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            // Default behavior is to run
            wen_archiver::cli::run::run(config_path).await?;
        }
        Some(Commands::Once { post }) => {
            wen_archiver::cli::run::once(config_path, post).await?;
        }
        Some(Commands::Patterns { hours }) => {
            wen_archiver::cli::inspect::patterns(config_path, hours).await?;
        }
        Some(Commands::Stats) => {
            wen_archiver::cli::inspect::stats(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                wen_archiver::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
