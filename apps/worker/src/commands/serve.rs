//! `nlu-worker serve`: runs task requests read as JSON lines from stdin.
//!
//! Each input line is one `TaskRequest`; each finished task prints one
//! `TaskReply` line on stdout. Replies come in completion order.

use super::cancel_on_ctrl_c;
use anyhow::{Context, Result};
use nlu_orchestrator::{TaskError, TaskOutput, TaskRequest, TaskRouter};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Result line for one task.
#[derive(Debug, Serialize)]
pub struct TaskReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReply {
    fn finished(request: &TaskRequest, result: Result<TaskOutput, TaskError>) -> Self {
        let (output, error) = match result {
            Ok(output) => (Some(output), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            task: Some(request.name()),
            update_id: Some(request.update_id().to_string()),
            ok: error.is_none(),
            output,
            error,
        }
    }

    fn rejected(error: &TaskError) -> Self {
        Self { task: None, update_id: None, ok: false, output: None, error: Some(error.to_string()) }
    }
}

fn emit(reply: &TaskReply) {
    match serde_json::to_string(reply) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "Could not encode task reply"),
    }
}

pub async fn execute(router: TaskRouter, max_concurrent_jobs: usize) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let permits = Arc::new(Semaphore::new(max_concurrent_jobs));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut running = JoinSet::new();

    info!(max_concurrent_jobs, "Waiting for tasks on stdin");
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read task from stdin")?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match TaskRequest::from_json(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected task request");
                emit(&TaskReply::rejected(&e));
                continue;
            }
        };

        let permit = tokio::select! {
            () = cancel.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => permit.context("Task limiter closed")?,
        };
        let router = router.clone();
        let cancel = cancel.clone();
        running.spawn(async move {
            let result = router.dispatch(request.clone(), &cancel).await;
            drop(permit);
            emit(&TaskReply::finished(&request, result));
        });
    }

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Task panicked");
        }
    }
    info!("No more tasks");
    Ok(())
}
