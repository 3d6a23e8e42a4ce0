//! codekb: personal code knowledge base
//!
//! Scans source trees for top-level functions and classes, embeds them
//! into a per-user vector index and answers natural-language searches.

mod commands;
mod config;
mod session;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::commands::App;

#[derive(Parser)]
#[command(name = "codekb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (default: $CODEKB_HOME or ~/.codekb)
    #[arg(long, global = true, env = "CODEKB_HOME")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in; prompts for anything not given as a flag
    Login {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        token: Option<String>,
    },

    /// Log out the current user
    Logout,

    /// Show the current user
    Status,

    /// Extract functions and classes from a directory
    Scan {
        /// Directory to scan
        #[arg(long)]
        path: PathBuf,

        /// Comma-separated category labels for every snippet
        #[arg(long)]
        category: Option<String>,
    },

    /// Build the vector index from the last scan
    Vectorize,

    /// Search the knowledge base
    Search {
        /// Natural-language or code query
        query: String,

        /// Only return snippets with this category
        #[arg(long)]
        category: Option<String>,

        /// Number of results (default from settings)
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Manage category labels
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Write a default codekb.toml
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List categories
    List,
    /// Add a category
    Add {
        #[arg(long)]
        name: String,
    },
    /// Remove a category
    Remove {
        #[arg(long)]
        name: String,
    },
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr only.
fn init_stderr_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Initialize logging to rotating files in `<data_dir>/logs/` with daily
/// rotation. `--verbose` also logs to stderr.
fn init_logging(data_dir: &Path, verbose: bool) {
    let logs_dir = data_dir.join("logs");

    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_stderr_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "codekb.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard would stop the writer thread.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(_guard);

    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(stderr_layer)
        .with(env_filter(verbose))
        .init();
}

fn prompt_login(username: Option<String>, token: Option<String>) -> Result<(String, String)> {
    use dialoguer::{Input, Password};

    let username = match username {
        Some(name) => name,
        None => Input::<String>::new().with_prompt("Username").interact_text()?,
    };
    let token = match token {
        Some(token) => token,
        None => Password::new()
            .with_prompt("Token (optional)")
            .allow_empty_password(true)
            .interact()?,
    };
    Ok((username, token))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref())?;
    init_logging(&data_dir, cli.verbose);
    tracing::debug!("Data directory: {}", data_dir.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Commands::Init { force } = cli.command {
        return commands::init(&data_dir, force, &mut out);
    }

    let app = App::load(data_dir)?;
    let result = match cli.command {
        Commands::Login { username, token } => {
            let (username, token) = prompt_login(username, token)?;
            commands::login(&app, &username, &token, &mut out)
        }
        Commands::Logout => commands::logout(&app, &mut out),
        Commands::Status => commands::status(&app, &mut out),
        Commands::Scan { path, category } => {
            let categories = commands::parse_categories(category.as_deref());
            commands::scan(&app, &path, &categories, &mut out)
        }
        Commands::Vectorize => commands::vectorize(&app, &mut out),
        Commands::Search {
            query,
            category,
            top_k,
        } => commands::search(&app, &query, category, top_k, &mut out),
        Commands::Categories { action } => match action {
            CategoryAction::List => commands::categories_list(&app, &mut out),
            CategoryAction::Add { name } => commands::categories_add(&app, &name, &mut out),
            CategoryAction::Remove { name } => commands::categories_remove(&app, &name, &mut out),
        },
        Commands::Init { .. } => Ok(()),
    };

    out.flush()?;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
