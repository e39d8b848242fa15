//! Canonical document format of a training corpus.
//!
//! The document is a single JSON object keyed by `rasa_nlu_data`. Writing is
//! deterministic: list orders follow the corpus and synonym groups follow the
//! first insertion of each canonical value.

use crate::corpus::{EntitySynonyms, Message, TrainingCorpus};
use crate::error::TrainingResult;
use nlu_abstraction::EntityAnnotation;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedDocument {
    pub rasa_nlu_data: NluData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NluData {
    #[serde(default)]
    pub common_examples: Vec<CommonExample>,
    #[serde(default)]
    pub label_examples: Vec<LabelExample>,
    #[serde(default)]
    pub regex_features: Vec<serde_json::Value>,
    #[serde(default)]
    pub entity_synonyms: Vec<SynonymGroup>,
}

/// Intent-bearing example; `intent` is always written, as `null` if unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonExample {
    pub text: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityAnnotation>,
}

/// Label example; never written with an intent, and any intent read back is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelExample {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<EntityAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub value: String,
    pub synonyms: Vec<String>,
}

/// Writes and reads the canonical corpus document.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusWriter;

impl CorpusWriter {
    #[must_use]
    pub fn to_document(corpus: &TrainingCorpus) -> SerializedDocument {
        let common_examples = corpus
            .common_examples
            .iter()
            .map(|m| CommonExample { text: m.text.clone(), intent: m.intent.clone(), entities: m.entities.clone() })
            .collect();
        let label_examples = corpus
            .label_examples
            .iter()
            .map(|m| LabelExample { text: m.text.clone(), entities: m.entities.clone() })
            .collect();
        let entity_synonyms = corpus
            .entity_synonyms
            .groups()
            .into_iter()
            .map(|(value, synonyms)| SynonymGroup {
                value: value.to_string(),
                synonyms: synonyms.into_iter().map(str::to_string).collect(),
            })
            .collect();

        SerializedDocument {
            rasa_nlu_data: NluData {
                common_examples,
                label_examples,
                regex_features: corpus.regex_features.clone(),
                entity_synonyms,
            },
        }
    }

    /// Pretty-printed JSON, two-space indent, non-ASCII text kept as is.
    pub fn dumps(corpus: &TrainingCorpus) -> TrainingResult<String> {
        Ok(serde_json::to_string_pretty(&Self::to_document(corpus))?)
    }

    pub fn to_writer<W: Write>(writer: W, corpus: &TrainingCorpus) -> TrainingResult<()> {
        serde_json::to_writer_pretty(writer, &Self::to_document(corpus))?;
        Ok(())
    }

    pub fn loads(json: &str) -> TrainingResult<TrainingCorpus> {
        let document: SerializedDocument = serde_json::from_str(json)?;
        Ok(document.into())
    }
}

impl From<SerializedDocument> for TrainingCorpus {
    fn from(document: SerializedDocument) -> Self {
        let data = document.rasa_nlu_data;

        let mut entity_synonyms = EntitySynonyms::new();
        for group in data.entity_synonyms {
            for raw in group.synonyms {
                entity_synonyms.insert(raw, group.value.clone());
            }
        }

        Self {
            common_examples: data
                .common_examples
                .into_iter()
                .map(|e| Message { text: e.text, intent: e.intent, entities: e.entities })
                .collect(),
            label_examples: data
                .label_examples
                .into_iter()
                .map(|e| Message::label(e.text, e.entities))
                .collect(),
            regex_features: data.regex_features,
            entity_synonyms,
        }
    }
}
