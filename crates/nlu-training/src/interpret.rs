//! Parsing and evaluation against persisted models.

use crate::corpus::{Message, TrainingCorpus};
use crate::error::TrainingResult;
use crate::registry::ModelStore;
use async_trait::async_trait;
use nlu_abstraction::EntityAnnotation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub update_id: String,
    pub text: String,
    pub intent: Option<IntentMatch>,
    #[serde(default)]
    pub entities: Vec<EntityAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misclassification {
    pub text: String,
    pub expected: String,
    pub predicted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub update_id: String,
    pub by: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    #[serde(default)]
    pub misclassified: Vec<Misclassification>,
}

/// Answers parse requests against the model of an update.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn parse(&self, update_id: &str, text: &str) -> TrainingResult<ParseResult>;
}

/// Scores the model of an update.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, update_id: &str, by: &str) -> TrainingResult<EvaluationReport>;
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Exact-text index over the common examples of a corpus. The first example
/// wins when two normalize to the same text.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    by_text: HashMap<String, Message>,
}

impl LookupIndex {
    #[must_use]
    pub fn from_corpus(corpus: &TrainingCorpus) -> Self {
        let mut by_text = HashMap::new();
        for message in &corpus.common_examples {
            by_text.entry(normalize(&message.text)).or_insert_with(|| message.clone());
        }
        Self { by_text }
    }

    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<&Message> {
        self.by_text.get(&normalize(text))
    }
}

/// Interpreter over the corpus persisted with a model.
#[derive(Debug, Clone)]
pub struct LookupInterpreter {
    store: ModelStore,
}

impl LookupInterpreter {
    #[must_use]
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }

    fn load_index(&self, update_id: &str) -> TrainingResult<LookupIndex> {
        let model = self.store.find(update_id)?;
        let corpus = self.store.load_corpus(&model)?;
        Ok(LookupIndex::from_corpus(&corpus))
    }
}

#[async_trait]
impl Interpreter for LookupInterpreter {
    async fn parse(&self, update_id: &str, text: &str) -> TrainingResult<ParseResult> {
        let index = self.load_index(update_id)?;
        let hit = index.lookup(text);
        debug!(update_id, matched = hit.is_some(), "Parsed text");

        Ok(ParseResult {
            update_id: update_id.to_string(),
            text: text.to_string(),
            intent: hit.and_then(|m| m.intent.clone()).map(|name| IntentMatch { name, confidence: 1.0 }),
            entities: hit.map(|m| m.entities.clone()).unwrap_or_default(),
        })
    }
}

/// Measures how many persisted common examples the lookup index classifies
/// correctly.
#[derive(Debug, Clone)]
pub struct CorpusEvaluator {
    store: ModelStore,
}

impl CorpusEvaluator {
    #[must_use]
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Evaluator for CorpusEvaluator {
    async fn evaluate(&self, update_id: &str, by: &str) -> TrainingResult<EvaluationReport> {
        let model = self.store.find(update_id)?;
        let corpus = self.store.load_corpus(&model)?;
        let index = LookupIndex::from_corpus(&corpus);

        let mut correct = 0;
        let mut misclassified = Vec::new();
        for message in &corpus.common_examples {
            let expected = message.intent.clone().unwrap_or_default();
            let predicted = index.lookup(&message.text).and_then(|m| m.intent.clone());
            if predicted.as_deref() == Some(expected.as_str()) {
                correct += 1;
            } else {
                misclassified.push(Misclassification { text: message.text.clone(), expected, predicted });
            }
        }

        let total = corpus.common_examples.len();
        let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
        info!(update_id, by, total, correct, accuracy, "Evaluation finished");

        Ok(EvaluationReport { update_id: update_id.to_string(), by: by.to_string(), total, correct, accuracy, misclassified })
    }
}
