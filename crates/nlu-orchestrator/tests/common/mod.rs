//! Test doubles shared by the orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nlu_abstraction::{
    Backend, BackendError, BackendResult, EntityAnnotation, ExampleId, ExampleRef, LabelExampleRef, TrainingRequest,
};
use nlu_orchestrator::TrainingOrchestrator;
use nlu_training::{
    LogCapture, PersistedModel, Persistor, PersistorFactory, Trainer, TrainerConfig, TrainerFactory,
    TrainingCorpus, TrainingError, TrainingResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One backend interaction, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(String),
    Entities(String),
    LabelEntities(String),
    Text(String),
    ReportFailure(String),
    ReportLog(String),
}

fn unavailable(endpoint: &'static str) -> BackendError {
    BackendError::Status { endpoint, status: 500, body: "internal error".to_string() }
}

/// In-memory backend serving one training request per update id.
#[derive(Default)]
pub struct FakeBackend {
    requests: HashMap<String, TrainingRequest>,
    texts: HashMap<String, String>,
    fail_start: bool,
    fail_text_for: Option<String>,
    fail_reports: bool,
    calls: Mutex<Vec<Call>>,
    logs: Mutex<HashMap<String, String>>,
}

impl FakeBackend {
    /// A job with common examples (`id`, `text`, `intent`) and label examples (`id`, `text`).
    pub fn with_job(mut self, update_id: &str, common: &[(&str, &str, &str)], label: &[(&str, &str)]) -> Self {
        let request = TrainingRequest {
            update_id: update_id.to_string(),
            by: String::new(),
            language: "en".to_string(),
            repository_uuid: format!("repo-{update_id}"),
            examples: common
                .iter()
                .map(|(id, _, intent)| ExampleRef { example_id: ExampleId::from(*id), intent: (*intent).to_string() })
                .collect(),
            label_examples: label.iter().map(|(id, _)| LabelExampleRef { example_id: ExampleId::from(*id) }).collect(),
            settings: serde_json::Map::new(),
        };
        for (id, text, _) in common {
            self.texts.insert((*id).to_string(), (*text).to_string());
        }
        for (id, text) in label {
            self.texts.insert((*id).to_string(), (*text).to_string());
        }
        self.requests.insert(update_id.to_string(), request);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_text_for(mut self, example_id: &str) -> Self {
        self.fail_text_for = Some(example_id.to_string());
        self
    }

    pub fn failing_reports(mut self) -> Self {
        self.fail_reports = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, update_id: &str) -> Vec<Call> {
        let ids: Vec<String> = self
            .requests
            .get(update_id)
            .map(|r| {
                r.examples
                    .iter()
                    .map(|e| e.example_id.0.clone())
                    .chain(r.label_examples.iter().map(|e| e.example_id.0.clone()))
                    .collect()
            })
            .unwrap_or_default();
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::Start(id) | Call::ReportFailure(id) | Call::ReportLog(id) => id == update_id,
                Call::Entities(id) | Call::LabelEntities(id) | Call::Text(id) => ids.contains(id),
            })
            .collect()
    }

    pub fn reported_log(&self, update_id: &str) -> Option<String> {
        self.logs.lock().unwrap().get(update_id).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn start_training(&self, update_id: &str, by: &str) -> BackendResult<TrainingRequest> {
        self.record(Call::Start(update_id.to_string()));
        if self.fail_start {
            return Err(BackendError::Transport {
                endpoint: "starttraining",
                message: "connection refused".to_string(),
            });
        }
        let mut request = self.requests.get(update_id).cloned().ok_or_else(|| unavailable("starttraining"))?;
        request.by = by.to_string();
        Ok(request)
    }

    async fn get_entities(&self, update_id: &str, _language: &str, example_id: &ExampleId) -> BackendResult<Vec<EntityAnnotation>> {
        self.record(Call::Entities(example_id.0.clone()));
        tokio::task::yield_now().await;
        info!(update_id, example_id = %example_id, "Served entities");
        Ok(vec![EntityAnnotation(serde_json::json!({"start": 0, "end": 1, "entity": "x", "value": "x"}))])
    }

    async fn get_label_entities(
        &self,
        update_id: &str,
        _language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<Vec<EntityAnnotation>> {
        self.record(Call::LabelEntities(example_id.0.clone()));
        tokio::task::yield_now().await;
        info!(update_id, example_id = %example_id, "Served label entities");
        Ok(vec![])
    }

    async fn get_text(&self, update_id: &str, _language: &str, example_id: &ExampleId) -> BackendResult<String> {
        self.record(Call::Text(example_id.0.clone()));
        tokio::task::yield_now().await;
        if self.fail_text_for.as_deref() == Some(example_id.0.as_str()) {
            return Err(unavailable("gettext"));
        }
        info!(update_id, example_id = %example_id, "Served text");
        self.texts.get(&example_id.0).cloned().ok_or_else(|| unavailable("gettext"))
    }

    async fn report_failure(&self, update_id: &str) -> BackendResult<()> {
        self.record(Call::ReportFailure(update_id.to_string()));
        if self.fail_reports {
            return Err(unavailable("trainfail"));
        }
        Ok(())
    }

    async fn report_log(&self, update_id: &str, transcript: &str) -> BackendResult<()> {
        self.record(Call::ReportLog(update_id.to_string()));
        if self.fail_reports {
            return Err(unavailable("traininglog"));
        }
        self.logs.lock().unwrap().insert(update_id.to_string(), transcript.to_string());
        Ok(())
    }
}

/// How the fake trainer behaves.
#[derive(Debug, Clone, Default)]
pub enum TrainerMode {
    #[default]
    Succeed,
    FailTrain,
    FailPersist,
    /// Cancels the token, then never finishes training.
    CancelAndHang(CancellationToken),
    /// Writes the model, cancels the token, then never finishes persisting.
    CancelDuringPersist(CancellationToken),
}

#[derive(Default)]
pub struct TrainerLog {
    pub trained: Mutex<Vec<TrainingCorpus>>,
}

pub struct FakeTrainerFactory {
    mode: TrainerMode,
    pub log: Arc<TrainerLog>,
}

impl FakeTrainerFactory {
    pub fn new(mode: TrainerMode) -> Self {
        Self { mode, log: Arc::default() }
    }
}

impl TrainerFactory for FakeTrainerFactory {
    fn create(&self, _config: &TrainerConfig) -> TrainingResult<Box<dyn Trainer>> {
        Ok(Box::new(FakeTrainer { mode: self.mode.clone(), log: Arc::clone(&self.log) }))
    }
}

struct FakeTrainer {
    mode: TrainerMode,
    log: Arc<TrainerLog>,
}

#[async_trait]
impl Trainer for FakeTrainer {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn train(&mut self, corpus: &TrainingCorpus) -> TrainingResult<()> {
        info!(examples = corpus.len(), "Fake training");
        self.log.trained.lock().unwrap().push(corpus.clone());
        match &self.mode {
            TrainerMode::FailTrain => Err(TrainingError::Trainer("model diverged".to_string())),
            TrainerMode::CancelAndHang(token) => {
                token.cancel();
                std::future::pending::<()>().await;
                Ok(())
            }
            TrainerMode::Succeed | TrainerMode::FailPersist | TrainerMode::CancelDuringPersist(_) => Ok(()),
        }
    }

    async fn persist(
        &self,
        scratch_dir: &Path,
        persistor: &dyn Persistor,
        project_name: &str,
        fixed_model_name: &str,
    ) -> TrainingResult<PersistedModel> {
        if matches!(self.mode, TrainerMode::FailPersist) {
            return Err(TrainingError::Persist("disk full".to_string()));
        }
        std::fs::write(scratch_dir.join("model.bin"), b"weights")?;
        if let TrainerMode::CancelDuringPersist(token) = &self.mode {
            token.cancel();
            std::future::pending::<()>().await;
        }
        persistor.persist(scratch_dir, project_name, fixed_model_name).await
    }
}

/// One `Persistor::persist` call: (job id, scratch dir, project, model name).
pub type PersistCall = (String, PathBuf, String, String);

#[derive(Default)]
pub struct RecordingPersistorFactory {
    pub calls: Arc<Mutex<Vec<PersistCall>>>,
}

impl PersistorFactory for RecordingPersistorFactory {
    fn for_job(&self, job_id: &str) -> Box<dyn Persistor> {
        Box::new(RecordingPersistor { job_id: job_id.to_string(), calls: Arc::clone(&self.calls) })
    }
}

struct RecordingPersistor {
    job_id: String,
    calls: Arc<Mutex<Vec<PersistCall>>>,
}

#[async_trait]
impl Persistor for RecordingPersistor {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn persist(&self, model_dir: &Path, project_name: &str, model_name: &str) -> TrainingResult<PersistedModel> {
        self.calls.lock().unwrap().push((
            self.job_id.clone(),
            model_dir.to_path_buf(),
            project_name.to_string(),
            model_name.to_string(),
        ));
        Ok(PersistedModel {
            project_name: project_name.to_string(),
            model_name: model_name.to_string(),
            location: model_dir.to_path_buf(),
        })
    }
}

/// Everything a test needs to drive and inspect one orchestrator.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub trainers: Arc<FakeTrainerFactory>,
    pub persistors: Arc<RecordingPersistorFactory>,
    pub orchestrator: Arc<TrainingOrchestrator>,
    pub capture: LogCapture,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new(backend: FakeBackend, mode: TrainerMode) -> Self {
        let backend = Arc::new(backend);
        let trainers = Arc::new(FakeTrainerFactory::new(mode));
        let persistors = Arc::new(RecordingPersistorFactory::default());
        let capture = LogCapture::default();
        let scratch = tempfile::TempDir::new().unwrap();
        let orchestrator = TrainingOrchestrator::new(
            Arc::clone(&backend) as Arc<dyn Backend>,
            Arc::clone(&trainers) as Arc<dyn TrainerFactory>,
            Arc::clone(&persistors) as Arc<dyn PersistorFactory>,
            capture.clone(),
        )
        .with_scratch_root(scratch.path());

        Self { backend, trainers, persistors, orchestrator: Arc::new(orchestrator), capture, scratch }
    }

    /// Installs a subscriber with this harness's capture layer for the current thread.
    pub fn subscribe(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::layer::SubscriberExt;
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.capture.layer()))
    }

    pub fn persist_calls(&self) -> Vec<PersistCall> {
        self.persistors.calls.lock().unwrap().clone()
    }

    /// Directories left under the scratch root.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path()).unwrap().map(|entry| entry.unwrap().path()).collect()
    }
}

/// Two common examples and one label example for update 42.
pub fn standard_backend() -> FakeBackend {
    FakeBackend::default().with_job(
        "42",
        &[("e1", "hello there", "greet"), ("e2", "book a table", "book")],
        &[("l1", "table for two")],
    )
}
