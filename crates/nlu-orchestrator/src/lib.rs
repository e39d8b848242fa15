//! Training job orchestrator for the NLU worker.
//!
//! `TrainingOrchestrator` runs one training job end to end and reports its
//! outcome to the backend. `TaskRouter` exposes training, parsing and
//! evaluation as named tasks.

pub mod error;
pub mod orchestrator;
pub mod tasks;

pub use error::{OrchestratorError, OrchestratorResult, ReportKind, ReportingError, TaskError};
pub use orchestrator::{TrainedJob, TrainingOrchestrator, SCRATCH_PREFIX};
pub use tasks::{
    TaskOutput, TaskRequest, TaskRouter, TASK_NLU_EVALUATE_UPDATE, TASK_NLU_PARSE_TEXT, TASK_NLU_TRAIN_UPDATE,
};
