//! Corpus assembly from backend-owned examples.
//!
//! The builder only talks to an `ExampleSource`, so a source that batches
//! requests can replace the per-field HTTP one without touching the
//! assembly order.

use crate::corpus::{Message, TrainingCorpus};
use async_trait::async_trait;
use nlu_abstraction::{Backend, BackendError, EntityAnnotation, ExampleId, TrainingRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which per-example fetch was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Entities,
    LabelEntities,
    Text,
}

impl std::fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Entities => "entities",
            Self::LabelEntities => "label entities",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// The fields of one example.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedExample {
    pub entities: Vec<EntityAnnotation>,
    pub text: String,
}

#[derive(Debug, Clone, Error)]
#[error("{phase} fetch failed: {source}")]
pub struct ExampleFetchError {
    pub phase: FetchPhase,
    #[source]
    pub source: BackendError,
}

/// A per-example fetch failed while assembling the corpus.
#[derive(Debug, Clone, Error)]
#[error("failed to fetch {phase} for example {example_id}: {source}")]
pub struct CorpusBuildError {
    pub example_id: ExampleId,
    pub phase: FetchPhase,
    #[source]
    pub source: BackendError,
}

impl CorpusBuildError {
    fn new(example_id: &ExampleId, err: ExampleFetchError) -> Self {
        Self { example_id: example_id.clone(), phase: err.phase, source: err.source }
    }
}

/// Capability to fetch the fields of one example.
#[async_trait]
pub trait ExampleSource: Send + Sync {
    /// Fetches entities and text of an intent-bearing example.
    async fn fetch_example(&self, example_id: &ExampleId) -> Result<FetchedExample, ExampleFetchError>;

    /// Fetches label entities and text of a label example.
    async fn fetch_label_example(&self, example_id: &ExampleId) -> Result<FetchedExample, ExampleFetchError>;
}

/// `ExampleSource` that issues one backend call per field.
pub struct BackendExampleSource<'a> {
    backend: &'a dyn Backend,
    update_id: &'a str,
    language: &'a str,
}

impl<'a> BackendExampleSource<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, request: &'a TrainingRequest) -> Self {
        Self { backend, update_id: &request.update_id, language: &request.language }
    }

    async fn fetch_text(&self, example_id: &ExampleId) -> Result<String, ExampleFetchError> {
        self.backend
            .get_text(self.update_id, self.language, example_id)
            .await
            .map_err(|source| ExampleFetchError { phase: FetchPhase::Text, source })
    }
}

#[async_trait]
impl ExampleSource for BackendExampleSource<'_> {
    async fn fetch_example(&self, example_id: &ExampleId) -> Result<FetchedExample, ExampleFetchError> {
        let entities = self
            .backend
            .get_entities(self.update_id, self.language, example_id)
            .await
            .map_err(|source| ExampleFetchError { phase: FetchPhase::Entities, source })?;
        let text = self.fetch_text(example_id).await?;
        Ok(FetchedExample { entities, text })
    }

    async fn fetch_label_example(&self, example_id: &ExampleId) -> Result<FetchedExample, ExampleFetchError> {
        let entities = self
            .backend
            .get_label_entities(self.update_id, self.language, example_id)
            .await
            .map_err(|source| ExampleFetchError { phase: FetchPhase::LabelEntities, source })?;
        let text = self.fetch_text(example_id).await?;
        Ok(FetchedExample { entities, text })
    }
}

/// Assembles the corpus of a request: common examples first, then label
/// examples, each in request order. Any failed fetch fails the whole build.
///
/// Examples whose text comes back blank are dropped with a warning.
pub async fn build_corpus(
    request: &TrainingRequest,
    source: &dyn ExampleSource,
) -> Result<TrainingCorpus, CorpusBuildError> {
    info!(
        update_id = %request.update_id,
        language = %request.language,
        examples = request.examples.len(),
        label_examples = request.label_examples.len(),
        "Building training corpus"
    );

    let mut common_examples = Vec::with_capacity(request.examples.len());
    for example in &request.examples {
        let fetched = source
            .fetch_example(&example.example_id)
            .await
            .map_err(|e| CorpusBuildError::new(&example.example_id, e))?;
        if fetched.text.trim().is_empty() {
            warn!(example_id = %example.example_id, "Skipping example with empty text");
            continue;
        }
        debug!(example_id = %example.example_id, intent = %example.intent, entities = fetched.entities.len(), "Fetched example");
        common_examples.push(Message::common(fetched.text, example.intent.clone(), fetched.entities));
    }

    let mut label_examples = Vec::with_capacity(request.label_examples.len());
    for example in &request.label_examples {
        let fetched = source
            .fetch_label_example(&example.example_id)
            .await
            .map_err(|e| CorpusBuildError::new(&example.example_id, e))?;
        if fetched.text.trim().is_empty() {
            warn!(example_id = %example.example_id, "Skipping label example with empty text");
            continue;
        }
        debug!(example_id = %example.example_id, entities = fetched.entities.len(), "Fetched label example");
        label_examples.push(Message::label(fetched.text, fetched.entities));
    }

    info!(
        common_examples = common_examples.len(),
        label_examples = label_examples.len(),
        "Training corpus ready"
    );
    Ok(TrainingCorpus::new(common_examples, label_examples))
}
