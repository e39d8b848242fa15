//! NLU worker - trains, evaluates and serves NLU models for a backend.
//!
//! This binary provides the `nlu-worker` command, which runs training jobs
//! announced by the backend and answers parse and evaluation requests from
//! the models it persisted.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nlu_training::LogCapture;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use config::WorkerConfig;

/// NLU training worker
#[derive(Parser, Debug)]
#[command(name = "nlu-worker", author, version, about = "NLU training worker")]
struct Args {
    /// Log level or filter directive (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Configuration file, merged over the global and local ones
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides NLU_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Directory of persisted models (overrides NLU_MODEL_STORE)
    #[arg(long, global = true)]
    model_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the model of an update
    ///
    /// Announces the job to the backend, fetches every example, trains and
    /// persists the model, and reports the training log.
    Train {
        /// Update to train
        #[arg(long)]
        update_id: String,

        /// User that requested the training
        #[arg(long)]
        by: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the persisted model of an update
    Evaluate {
        /// Update to evaluate
        #[arg(long)]
        update_id: String,

        /// User that requested the evaluation
        #[arg(long)]
        by: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse text with the persisted model of an update
    Parse {
        /// Update whose model answers
        #[arg(long)]
        update_id: String,

        /// Text to parse
        text: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run task requests read as JSON lines from stdin
    Serve {
        /// Tasks run at the same time (overrides max_concurrent_jobs)
        #[arg(long)]
        max_concurrent_jobs: Option<usize>,
    },
}

/// Console filter precedence: `--log-level`, then RUST_LOG, then the config file.
fn console_filter(flag: Option<&str>, configured: Option<&str>) -> Result<EnvFilter> {
    if let Some(directive) = flag {
        return EnvFilter::try_new(directive).with_context(|| format!("Invalid log level: {directive}"));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = configured.unwrap_or("info");
    EnvFilter::try_new(directive).with_context(|| format!("Invalid log level: {directive}"))
}

// `try_init` also installs the `log` -> tracing bridge, so dependencies that
// log through `log` reach the job transcript.
fn init_tracing(filter: EnvFilter, capture: &LogCapture) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter))
        .with(capture.layer())
        .try_init()
        .context("Failed to install tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = WorkerConfig::discover_and_load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.backend_url {
        config.backend.base_url = Some(url);
    }
    if let Some(store) = args.model_store {
        config.model_store = Some(store);
    }

    let capture = LogCapture::new(config.capture_level()?);
    init_tracing(console_filter(args.log_level.as_deref(), config.log_level.as_deref())?, &capture)?;

    let router = commands::build_router(&config, capture)?;

    match args.command {
        Command::Train { update_id, by, json } => commands::train::execute(&router, &update_id, &by, json).await,
        Command::Evaluate { update_id, by, json } => {
            commands::evaluate::execute(&router, &update_id, &by, json).await
        }
        Command::Parse { update_id, text, json } => commands::parse::execute(&router, &update_id, &text, json).await,
        Command::Serve { max_concurrent_jobs } => {
            let limit = match max_concurrent_jobs {
                Some(0) => anyhow::bail!("--max-concurrent-jobs must be at least 1"),
                Some(n) => n,
                None => config.max_concurrent_jobs()?,
            };
            commands::serve::execute(router, limit).await
        }
    }
}
