//! # fretwise CLI
//!
//! Command-line interface for the guitar advisor.
//!
//! ```bash
//! fretwise --config ./config/fretwise.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Start the HTTP server |
//! | `chat` | Interactive chat in the terminal |
//! | `recommend` | Rank products for structured preferences |
//! | `search` | Similarity search over the catalog |
//! | `catalog` | List the catalog |
//! | `completions` | Print a shell completion script |
//!
//! A missing config file is not an error: built-in defaults apply. Set
//! `OPENAI_API_KEY` (or put it in `.env`) for the OpenAI providers.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fretwise::{commands, config, server};
use fretwise_core::models::Preferences;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "fretwise=info,fretwise_core=info,tower_http=info";

/// fretwise — a conversational guitar advisor with retrieval-augmented
/// recommendations.
#[derive(Parser)]
#[command(name = "fretwise", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fretwise.toml`; when that file does not exist
    /// the built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/fretwise.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server] bind`.
    Serve,

    /// Chat with the advisor in the terminal. Type `quit` to exit.
    Chat,

    /// Recommend products for the given preferences.
    Recommend {
        /// Maximum price.
        #[arg(long)]
        budget: Option<f64>,

        /// Guitar type, e.g. `Electric` or `Acoustic`.
        #[arg(long)]
        style: Option<String>,

        /// Preferred brand.
        #[arg(long)]
        brand: Option<String>,

        /// Desired feature (repeatable).
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Experience level: beginner, intermediate or expert.
        #[arg(long)]
        level: Option<String>,
    },

    /// Search the catalog by similarity.
    ///
    /// QUERY may be a JSON filter object or free text.
    Search {
        /// JSON filter or free-text query.
        query: String,
    },

    /// List every product in the catalog.
    Catalog,

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "fretwise", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chat => {
            commands::run_chat(&cfg).await?;
        }
        Commands::Recommend {
            budget,
            style,
            brand,
            features,
            level,
        } => {
            let prefs = Preferences {
                budget,
                style,
                brand,
                features: features.into_iter().collect::<BTreeSet<_>>(),
                experience_level: level,
            };
            commands::run_recommend(&cfg, prefs).await?;
        }
        Commands::Search { query } => {
            commands::run_search(&cfg, &query).await?;
        }
        Commands::Catalog => {
            commands::run_catalog(&cfg)?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
