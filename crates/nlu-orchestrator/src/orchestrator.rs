//! Training job orchestration.
//!
//! A job starts on the backend, then builds its corpus, trains and persists
//! inside a log capture scope. Failures are reported to the backend and
//! returned unchanged; the captured transcript is reported on every path
//! once the job has started.

use crate::error::{OrchestratorError, OrchestratorResult, ReportKind, ReportingError};
use nlu_abstraction::{Backend, TrainingRequest};
use nlu_training::{
    build_corpus, BackendExampleSource, LogCapture, PersistedModel, PersistorFactory, TrainerConfig,
    TrainerFactory, TrainingError, TrainingLog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Prefix of the scratch directories trainers persist from.
pub const SCRATCH_PREFIX: &str = "nlu-train-";

/// Outcome of a job that reached the trained state.
#[derive(Debug)]
pub struct TrainedJob {
    pub update_id: String,
    pub model: PersistedModel,
    /// Everything the job logged inside its capture scope.
    pub log: TrainingLog,
    /// Reports the backend did not accept. The job still succeeded.
    pub reporting_errors: Vec<ReportingError>,
}

/// Runs training jobs against a backend.
///
/// The orchestrator holds no per-job state, so one instance can run any
/// number of jobs at the same time.
pub struct TrainingOrchestrator {
    backend: Arc<dyn Backend>,
    trainers: Arc<dyn TrainerFactory>,
    persistors: Arc<dyn PersistorFactory>,
    capture: LogCapture,
    scratch_root: Option<PathBuf>,
}

impl TrainingOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Arguments
    /// * `backend` - Backend that owns the jobs and their examples
    /// * `trainers` - Creates a trainer per job
    /// * `persistors` - Creates a persistor bound to each job
    /// * `capture` - Log capture whose layer is installed in the subscriber
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        trainers: Arc<dyn TrainerFactory>,
        persistors: Arc<dyn PersistorFactory>,
        capture: LogCapture,
    ) -> Self {
        Self { backend, trainers, persistors, capture, scratch_root: None }
    }

    /// Creates scratch directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn capture(&self) -> &LogCapture {
        &self.capture
    }

    /// Runs one training job.
    ///
    /// # Arguments
    /// * `update_id` - The job to train
    /// * `by` - Actor that requested the job
    /// * `cancel` - Cancels the job; a cancelled job fails like any other
    ///
    /// # Returns
    /// The persisted model, or the error that failed the job. A failure of
    /// the start call is returned without any report; everything after it
    /// is followed by a failure report (on error) and a log report.
    pub async fn train_update(
        &self,
        update_id: &str,
        by: &str,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<TrainedJob> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled(update_id.to_string()));
        }

        let request = match self.backend.start_training(update_id, by).await {
            Ok(request) => request,
            Err(e) => {
                error!(update_id, error = %e, "Could not start training");
                return Err(e.into());
            }
        };

        let scope = self.capture.open(update_id);
        let mut reporting_errors = Vec::new();
        let mut scratch = None;

        let result = async {
            info!(update_id, by, language = %request.language, "Training started");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(OrchestratorError::Cancelled(update_id.to_string())),
                result = self.run(update_id, &request, &mut scratch) => result,
            };

            if let Err(e) = &result {
                error!(update_id, kind = e.kind(), error = %e, "Training failed");
                if let Some(dir) = scratch.as_deref() {
                    discard_scratch(dir);
                }
                if let Err(source) = self.backend.report_failure(update_id).await {
                    let err = ReportingError::new(ReportKind::Failure, update_id, source);
                    warn!(error = %err, "Failure report was not delivered");
                    reporting_errors.push(err);
                }
            }
            result
        }
        .instrument(scope.span().clone())
        .await;

        let log = scope.finish();
        debug!(update_id, lines = log.len(), "Training log captured");
        if let Err(source) = self.backend.report_log(update_id, &log.transcript()).await {
            let err = ReportingError::new(ReportKind::Log, update_id, source);
            warn!(error = %err, "Training log report was not delivered");
            reporting_errors.push(err);
        }

        let model = result?;
        info!(update_id, location = %model.location.display(), "Training finished");
        Ok(TrainedJob { update_id: update_id.to_string(), model, log, reporting_errors })
    }

    async fn run(
        &self,
        update_id: &str,
        request: &TrainingRequest,
        scratch: &mut Option<PathBuf>,
    ) -> OrchestratorResult<PersistedModel> {
        let source = BackendExampleSource::new(self.backend.as_ref(), request);
        let corpus = build_corpus(request, &source).await?;

        let mut trainer = self.trainers.create(&TrainerConfig::from_request(request))?;
        info!(trainer = trainer.id(), examples = corpus.len(), "Training model");
        trainer.train(&corpus).await?;

        let scratch_dir = scratch.insert(self.scratch_dir()?);
        let persistor = self.persistors.for_job(update_id);
        debug!(scratch_dir = %scratch_dir.display(), "Persisting model");
        let model = trainer
            .persist(scratch_dir, persistor.as_ref(), &request.repository_uuid, &request.update_id)
            .await?;
        Ok(model)
    }

    // Kept on success: the persistor owns the directory once `persist` returns.
    fn scratch_dir(&self) -> Result<PathBuf, TrainingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match self.scratch_root.as_deref() {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir.keep())
    }
}

/// Removes the scratch directory of a failed or cancelled job.
fn discard_scratch(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(scratch_dir = %dir.display(), "Removed scratch directory"),
        Err(e) => warn!(scratch_dir = %dir.display(), error = %e, "Failed to remove scratch directory"),
    }
}
