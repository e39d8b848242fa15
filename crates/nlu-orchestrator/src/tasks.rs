//! Named tasks the worker accepts.
//!
//! A task request is a JSON object tagged by its `task` name, e.g.
//! `{"task": "nlu.train_update", "update_id": 42, "by_id": 7}`.

use crate::error::TaskError;
use crate::orchestrator::TrainingOrchestrator;
use nlu_abstraction::deserialize_id;
use nlu_training::{EvaluationReport, Evaluator, Interpreter, ParseResult, PersistedModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

pub const TASK_NLU_PARSE_TEXT: &str = "nlu.parse_text";
pub const TASK_NLU_TRAIN_UPDATE: &str = "nlu.train_update";
pub const TASK_NLU_EVALUATE_UPDATE: &str = "nlu.evaluate_update";

/// A request for one of the worker's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task")]
pub enum TaskRequest {
    #[serde(rename = "nlu.parse_text")]
    ParseText {
        #[serde(deserialize_with = "deserialize_id")]
        update_id: String,
        text: String,
    },
    #[serde(rename = "nlu.train_update")]
    TrainUpdate {
        #[serde(deserialize_with = "deserialize_id")]
        update_id: String,
        #[serde(deserialize_with = "deserialize_id")]
        by_id: String,
    },
    #[serde(rename = "nlu.evaluate_update")]
    EvaluateUpdate {
        #[serde(deserialize_with = "deserialize_id")]
        update_id: String,
        #[serde(deserialize_with = "deserialize_id")]
        by_id: String,
    },
}

impl TaskRequest {
    /// Decodes a request from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ParseText { .. } => TASK_NLU_PARSE_TEXT,
            Self::TrainUpdate { .. } => TASK_NLU_TRAIN_UPDATE,
            Self::EvaluateUpdate { .. } => TASK_NLU_EVALUATE_UPDATE,
        }
    }

    #[must_use]
    pub fn update_id(&self) -> &str {
        match self {
            Self::ParseText { update_id, .. }
            | Self::TrainUpdate { update_id, .. }
            | Self::EvaluateUpdate { update_id, .. } => update_id,
        }
    }
}

/// What a task produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskOutput {
    Parsed(ParseResult),
    Trained {
        update_id: String,
        model: PersistedModel,
        /// Reports the backend did not accept, as messages.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        reporting_errors: Vec<String>,
    },
    Evaluated(EvaluationReport),
}

/// Routes task requests to the orchestrator, interpreter and evaluator.
#[derive(Clone)]
pub struct TaskRouter {
    orchestrator: Arc<TrainingOrchestrator>,
    interpreter: Arc<dyn Interpreter>,
    evaluator: Arc<dyn Evaluator>,
}

impl TaskRouter {
    #[must_use]
    pub fn new(
        orchestrator: Arc<TrainingOrchestrator>,
        interpreter: Arc<dyn Interpreter>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self { orchestrator, interpreter, evaluator }
    }

    /// Runs one task to completion.
    pub async fn dispatch(&self, request: TaskRequest, cancel: &CancellationToken) -> Result<TaskOutput, TaskError> {
        let span = info_span!("task", name = request.name(), update_id = %request.update_id());

        async move {
            info!("Task received");
            match request {
                TaskRequest::ParseText { update_id, text } => self.parse_text(&update_id, &text).await,
                TaskRequest::TrainUpdate { update_id, by_id } => self.train_update(&update_id, &by_id, cancel).await,
                TaskRequest::EvaluateUpdate { update_id, by_id } => self.evaluate_update(&update_id, &by_id).await,
            }
        }
        .instrument(span)
        .await
    }

    /// `nlu.parse_text`
    pub async fn parse_text(&self, update_id: &str, text: &str) -> Result<TaskOutput, TaskError> {
        let parsed = self.interpreter.parse(update_id, text).await.map_err(TaskError::Parse)?;
        Ok(TaskOutput::Parsed(parsed))
    }

    /// `nlu.train_update`
    pub async fn train_update(
        &self,
        update_id: &str,
        by_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, TaskError> {
        let job = self.orchestrator.train_update(update_id, by_id, cancel).await?;
        Ok(TaskOutput::Trained {
            update_id: job.update_id,
            model: job.model,
            reporting_errors: job.reporting_errors.iter().map(ToString::to_string).collect(),
        })
    }

    /// `nlu.evaluate_update`
    pub async fn evaluate_update(&self, update_id: &str, by_id: &str) -> Result<TaskOutput, TaskError> {
        let report = self.evaluator.evaluate(update_id, by_id).await.map_err(TaskError::Evaluate)?;
        Ok(TaskOutput::Evaluated(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_numeric_ids() {
        let request = TaskRequest::from_json(r#"{"task": "nlu.train_update", "update_id": 42, "by_id": 7}"#).unwrap();
        assert_eq!(request, TaskRequest::TrainUpdate { update_id: "42".to_string(), by_id: "7".to_string() });
        assert_eq!(request.name(), TASK_NLU_TRAIN_UPDATE);
        assert_eq!(request.update_id(), "42");
    }

    #[test]
    fn test_request_names_match_wire_tags() {
        let parse = TaskRequest::ParseText { update_id: "1".to_string(), text: "hi".to_string() };
        let json = serde_json::to_value(&parse).unwrap();
        assert_eq!(json["task"], TASK_NLU_PARSE_TEXT);
        assert_eq!(parse.name(), TASK_NLU_PARSE_TEXT);

        let evaluate = TaskRequest::from_json(r#"{"task": "nlu.evaluate_update", "update_id": "3", "by_id": "u"}"#)
            .unwrap();
        assert_eq!(evaluate.name(), TASK_NLU_EVALUATE_UPDATE);
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let err = TaskRequest::from_json(r#"{"task": "nlu.explode", "update_id": 1}"#).unwrap_err();
        assert!(matches!(err, TaskError::InvalidRequest(_)));
    }
}
