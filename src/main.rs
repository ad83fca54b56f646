//! # Palisade CLI
//!
//! The `palisade` binary turns a GitHub issue into a pull request: it
//! indexes the repository's source text, retrieves the chunks most
//! similar to the issue, asks the remote generator service for a
//! single-file change, and publishes the result as a new branch and PR.
//!
//! ## Usage
//!
//! ```bash
//! palisade --config ./palisade.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `palisade run <owner/repo> <issue>` | Execute the full pipeline |
//! | `palisade index <owner/repo>` | Build (or reuse) the similarity index |
//! | `palisade search <owner/repo> "<query>"` | Query an existing index |
//!
//! ## Environment
//!
//! | Variable | Used for |
//! |----------|----------|
//! | `GITHUB_TOKEN` | All GitHub REST calls |
//! | `HF_TOKEN` | Hugging Face embedding provider |
//! | `OPENAI_API_KEY` | OpenAI embedding provider |
//! | `CF_AUTH_TOKEN` | Generator service (fallback for `--auth-token`) |

mod chunk;
mod config;
mod embedding;
mod error;
mod generator;
mod github;
mod index;
mod models;
mod pipeline;
mod publish;
mod retrieve;
mod scan;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Credentials;

/// Palisade — issue-driven feature bot.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; without one, `./palisade.toml` is used when present and built-in
/// defaults otherwise.
#[derive(Parser)]
#[command(
    name = "palisade",
    about = "Palisade — turn a GitHub issue into a pull request via retrieval and a remote generator",
    version,
    long_about = "Palisade indexes a repository's source text into a persisted similarity index, \
    retrieves the chunks most relevant to a GitHub issue, forwards issue and context to a remote \
    change-generator service, and applies the returned file edit as a new branch and pull request."
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to `./palisade.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the full issue-to-pull-request pipeline.
    ///
    /// Builds or reuses the repository's similarity index, fetches the
    /// issue, retrieves context, requests a change from the generator
    /// service, and publishes it as a branch and pull request.
    /// Requires `GITHUB_TOKEN` and the embedding provider's token.
    Run {
        /// Repository full name, `owner/repo`.
        repo: String,

        /// Issue number to develop against.
        issue: u64,

        /// Generator service token. Falls back to `CF_AUTH_TOKEN`;
        /// without either, the request is sent unauthenticated.
        #[arg(long)]
        auth_token: Option<String>,
    },

    /// Build the similarity index for a repository.
    ///
    /// Scans the configured checkout root, chunks and embeds the source
    /// text, and persists the index under `index.dir` keyed by the
    /// repository short name. An existing index is reused as-is.
    Index {
        /// Repository full name, `owner/repo`.
        repo: String,

        /// Delete any persisted index first and build from scratch.
        #[arg(long)]
        rebuild: bool,

        /// Show file and chunk counts without embedding anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Query an existing similarity index.
    ///
    /// Embeds the query text and prints the most similar chunks with
    /// their scores and source paths.
    Search {
        /// Repository full name, `owner/repo`.
        repo: String,

        /// The query string.
        query: String,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            repo,
            issue,
            auth_token,
        } => {
            let creds = Credentials::from_env(&cfg, auth_token);
            pipeline::run(&cfg, &creds, &repo, issue).await?;
        }
        Commands::Index {
            repo,
            rebuild,
            dry_run,
        } => {
            let creds = Credentials::from_env(&cfg, None);
            pipeline::run_index(&cfg, &creds, &repo, rebuild, dry_run).await?;
        }
        Commands::Search { repo, query, limit } => {
            let creds = Credentials::from_env(&cfg, None);
            pipeline::run_search(&cfg, &creds, &repo, &query, limit).await?;
        }
    }

    Ok(())
}
