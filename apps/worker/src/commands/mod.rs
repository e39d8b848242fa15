//! Worker commands.

pub mod evaluate;
pub mod parse;
pub mod serve;
pub mod train;

use crate::config::WorkerConfig;
use anyhow::{Context, Result};
use nlu_backend::HttpBackend;
use nlu_orchestrator::{TaskOutput, TaskRouter, TrainingOrchestrator};
use nlu_training::{CorpusEvaluator, ExportTrainerFactory, FsPersistorFactory, LogCapture, LookupInterpreter, ModelStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wires the HTTP backend, the export trainer and the local model store.
pub fn build_router(config: &WorkerConfig, capture: LogCapture) -> Result<TaskRouter> {
    let backend_config = config.backend_config();
    let backend = HttpBackend::new(&backend_config).context("Failed to create backend client")?;
    let store_root = config.model_store();
    debug!(base_url = %backend.base_url(), model_store = %store_root.display(), "Worker configured");

    let orchestrator = TrainingOrchestrator::new(
        Arc::new(backend),
        Arc::new(ExportTrainerFactory),
        Arc::new(FsPersistorFactory::new(store_root.clone())),
        capture,
    );
    let store = ModelStore::new(store_root);

    Ok(TaskRouter::new(
        Arc::new(orchestrator),
        Arc::new(LookupInterpreter::new(store.clone())),
        Arc::new(CorpusEvaluator::new(store)),
    ))
}

/// A token cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling running tasks");
                child.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
    token
}

pub fn print_json(output: &TaskOutput) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}
