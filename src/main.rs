//! # Review Harness CLI (`rvh`)
//!
//! ## Usage
//!
//! ```bash
//! rvh --config ./config/rvh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rvh index <repo>` | Build the repository index, or load it from cache |
//! | `rvh ask <repo> [question]` | Answer a question; interactive without one |
//! | `rvh review <issues.json>` | Re-score, deduplicate, order and filter findings |
//!
//! ## Examples
//!
//! ```bash
//! # Index a checkout (cached until HEAD or the files change)
//! rvh index ~/src/webhook-service
//!
//! # One-shot question
//! rvh ask ~/src/webhook-service "Which HTTP handlers does cmd/webhook.go register?"
//!
//! # Aggregate analyzer output, keep only findings on the PR's added lines
//! rvh review issues.json --diff pr.diff --threshold error
//! ```
//!
//! Ctrl-C cancels the running command. An interrupted index pass keeps
//! what it gathered for the current session but is not cached.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use review_harness::config::{self, Config};
use review_harness::progress::ProgressMode;
use review_harness::review_cmd::ReviewOptions;
use review_harness::{ask_cmd, index_cmd, review_cmd};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Review Harness CLI: repository question answering and review result
/// aggregation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rvh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rvh",
    about = "Review Harness: repository question answering and code-review result aggregation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rvh.toml`. Built-in defaults are used when the
    /// default path does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Indexing progress on stderr. Defaults to `human` on a terminal,
    /// `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or load the index for a repository.
    ///
    /// Prints the chunk count and whether the index came from cache.
    Index {
        /// Repository root.
        repo: PathBuf,
    },

    /// Ask a question about a repository.
    ///
    /// Without a question, starts an interactive session; type `exit` to
    /// quit.
    Ask {
        /// Repository root.
        repo: PathBuf,
        /// The question. Omit for an interactive session.
        question: Option<String>,
    },

    /// Aggregate analyzer findings into a JSON report.
    Review {
        /// JSON array of issues.
        issues: PathBuf,

        /// Unified diff; issues are moved onto its added lines and issues
        /// in files outside the diff are dropped.
        #[arg(long)]
        diff: Option<PathBuf>,

        /// Minimum severity to report (`critical`, `error`, `warning`,
        /// `info`, `hint`, or `high`/`medium`/`low`).
        #[arg(long)]
        threshold: Option<String>,

        /// Skip AI severity re-scoring.
        #[arg(long)]
        no_ai: bool,
    },
}

const DEFAULT_CONFIG_PATH: &str = "./config/rvh.toml";

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .try_init();
}

fn resolve_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(&default)
            } else {
                tracing::debug!("no config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = resolve_config(cli.config.as_ref())?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .sink();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Index { repo } => {
            index_cmd::run_index(&cfg, &repo, progress, &cancel).await?;
        }
        Commands::Ask { repo, question } => {
            ask_cmd::run_ask(&cfg, &repo, question.as_deref(), progress, &cancel).await?;
        }
        Commands::Review {
            issues,
            diff,
            threshold,
            no_ai,
        } => {
            let opts = ReviewOptions {
                issues_path: &issues,
                diff_path: diff.as_deref(),
                threshold: threshold.as_deref(),
                no_ai,
            };
            review_cmd::run_review(&cfg, opts, &cancel).await?;
        }
    }

    Ok(())
}
