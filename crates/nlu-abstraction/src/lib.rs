//! Backend abstraction layer for the NLU training worker.
//!
//! This module defines the wire types the worker receives from the backend
//! that owns examples, entities and texts, and the `Backend` trait every
//! backend client implements.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Represents an error that can occur when talking to the backend.
///
/// Every variant belongs to the "backend unavailable" class: the call either
/// never completed or produced something the worker cannot use.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request could not be sent or the connection failed.
    #[error("backend unavailable ({endpoint}): {message}")]
    Transport {
        /// The backend call that failed.
        endpoint: &'static str,
        /// Transport error description.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("backend returned {status} for {endpoint}: {body}")]
    Status {
        /// The backend call that failed.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body was not the JSON shape the call expects.
    #[error("malformed backend response from {endpoint}: {message}")]
    Malformed {
        /// The backend call that failed.
        endpoint: &'static str,
        /// Decoding error description.
        message: String,
    },
}

impl BackendError {
    /// Name of the backend call this error came from.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Malformed { endpoint, .. } => endpoint,
        }
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Deserializes an identifier sent either as a JSON number or a string.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Opaque identifier of an example owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExampleId(pub String);

impl<'de> Deserialize<'de> for ExampleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_id(deserializer).map(Self)
    }
}

impl std::fmt::Display for ExampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ExampleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Reference to an intent-bearing example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRef {
    pub example_id: ExampleId,
    #[serde(rename = "example_intent")]
    pub intent: String,
}

/// Reference to a label-only example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelExampleRef {
    pub example_id: ExampleId,
}

/// A training request as returned by the backend when a job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// Job identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub update_id: String,

    /// Actor that triggered the job. Filled in by the client from the start call.
    #[serde(default)]
    pub by: String,

    /// Language of the examples.
    pub language: String,

    /// Repository the job belongs to.
    #[serde(deserialize_with = "deserialize_id")]
    pub repository_uuid: String,

    /// Intent-bearing examples, in training order.
    #[serde(default)]
    pub examples: Vec<ExampleRef>,

    /// Label-only examples, in training order.
    #[serde(default, rename = "label_examples_query")]
    pub label_examples: Vec<LabelExampleRef>,

    /// Any other keys the backend sends; handed to the trainer untouched.
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// One entity annotation, passed through verbatim.
///
/// The worker never interprets annotations; the accessors only peek at the
/// usual `start`/`end`/`entity` keys for logging and lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityAnnotation(pub serde_json::Value);

impl EntityAnnotation {
    #[must_use]
    pub fn start(&self) -> Option<u64> {
        self.0.get("start").and_then(serde_json::Value::as_u64)
    }

    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.0.get("end").and_then(serde_json::Value::as_u64)
    }

    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        self.0.get("entity").and_then(serde_json::Value::as_str)
    }
}

impl From<serde_json::Value> for EntityAnnotation {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A client for the backend that owns the training data of a job.
///
/// Every call is a single request/response exchange. Retries, if any,
/// belong to the caller.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Announces that training starts and returns the job's request.
    async fn start_training(&self, update_id: &str, by: &str) -> BackendResult<TrainingRequest>;

    /// Fetches the entity annotations of one intent-bearing example.
    async fn get_entities(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<Vec<EntityAnnotation>>;

    /// Fetches the label entity annotations of one label example.
    async fn get_label_entities(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<Vec<EntityAnnotation>>;

    /// Fetches the text of one example.
    async fn get_text(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<String>;

    /// Marks the job as failed.
    async fn report_failure(&self, update_id: &str) -> BackendResult<()>;

    /// Stores the job's training log transcript.
    async fn report_log(&self, update_id: &str, transcript: &str) -> BackendResult<()>;
}
