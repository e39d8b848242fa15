//! HTTP backend client.
//!
//! This module provides an implementation of the `Backend` trait that talks to
//! the training authorization API of the backend over HTTP.

use async_trait::async_trait;
use nlu_abstraction::{
    Backend, BackendError, BackendResult, EntityAnnotation, ExampleId, TrainingRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Path prefix shared by every training endpoint.
const TRAIN_API_PREFIX: &str = "v2/repository/nlp/authorization/train";

/// Connection settings for the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://localhost:8000").
    pub base_url: String,

    /// Request timeout in seconds. The HTTP client default applies when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8000".to_string(), timeout_secs: None }
    }
}

/// Backend client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Base URL without trailing slash.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` from its configuration.
    ///
    /// # Errors
    /// Returns a `BackendError` if the HTTP client cannot be created.
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| BackendError::Transport {
            endpoint: "client",
            message: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Self { base_url: config.base_url.trim_end_matches('/').to_string(), client })
    }

    /// Creates a client for `base_url` with default settings.
    pub fn with_base_url(base_url: impl Into<String>) -> BackendResult<Self> {
        Self::new(&BackendConfig { base_url: base_url.into(), timeout_secs: None })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}/", self.base_url, TRAIN_API_PREFIX, endpoint)
    }

    fn example_query<'a>(
        update_id: &'a str,
        language: &'a str,
        example_id: &'a ExampleId,
    ) -> [(&'static str, &'a str); 3] {
        [("update_id", update_id), ("language", language), ("example_id", example_id.0.as_str())]
    }

    /// Sends a request and decodes the JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        let body = self.execute_raw(endpoint, request).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(endpoint, error = %e, "Failed to parse backend response");
            BackendError::Malformed { endpoint, message: e.to_string() }
        })
    }

    /// Sends a request whose body only acknowledges the call.
    async fn execute_ack(&self, endpoint: &'static str, request: RequestBuilder) -> BackendResult<()> {
        let body = self.execute_raw(endpoint, request).await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        serde_json::from_str::<serde_json::Value>(&body).map(|_| ()).map_err(|e| {
            error!(endpoint, error = %e, "Failed to parse backend acknowledgement");
            BackendError::Malformed { endpoint, message: e.to_string() }
        })
    }

    async fn execute_raw(&self, endpoint: &'static str, request: RequestBuilder) -> BackendResult<String> {
        let response = request.send().await.map_err(|e| {
            error!(endpoint, error = %e, base_url = %self.base_url, "Failed to reach backend");
            BackendError::Transport { endpoint, message: e.to_string() }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(endpoint, error = %e, "Failed to read backend response body");
            BackendError::Transport { endpoint, message: e.to_string() }
        })?;

        if !status.is_success() {
            error!(endpoint, status = %status, body = %body, "Backend returned error status");
            return Err(BackendError::Status { endpoint, status: status.as_u16(), body });
        }

        Ok(body)
    }
}

#[derive(Deserialize)]
struct EntitiesResponse {
    entities: Vec<EntityAnnotation>,
}

#[derive(Deserialize)]
struct TextResponse {
    get_text: String,
}

#[async_trait]
impl Backend for HttpBackend {
    async fn start_training(&self, update_id: &str, by: &str) -> BackendResult<TrainingRequest> {
        debug!(update_id, by, "Requesting training start");

        let request = self
            .client
            .post(self.endpoint_url("starttraining"))
            .form(&[("update_id", update_id), ("by_user", by)]);
        let mut training: TrainingRequest = self.execute("starttraining", request).await?;
        if training.by.is_empty() {
            training.by = by.to_string();
        }

        debug!(
            update_id,
            language = %training.language,
            examples = training.examples.len(),
            label_examples = training.label_examples.len(),
            "Training started"
        );
        Ok(training)
    }

    async fn get_entities(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<Vec<EntityAnnotation>> {
        debug!(update_id, language, example_id = %example_id, "Fetching example entities");

        let request = self
            .client
            .get(self.endpoint_url("getentities"))
            .query(&Self::example_query(update_id, language, example_id));
        let response: EntitiesResponse = self.execute("getentities", request).await?;
        Ok(response.entities)
    }

    async fn get_label_entities(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<Vec<EntityAnnotation>> {
        debug!(update_id, language, example_id = %example_id, "Fetching example label entities");

        let request = self
            .client
            .get(self.endpoint_url("getentitieslabel"))
            .query(&Self::example_query(update_id, language, example_id));
        let response: EntitiesResponse = self.execute("getentitieslabel", request).await?;
        Ok(response.entities)
    }

    async fn get_text(
        &self,
        update_id: &str,
        language: &str,
        example_id: &ExampleId,
    ) -> BackendResult<String> {
        debug!(update_id, language, example_id = %example_id, "Fetching example text");

        let request = self
            .client
            .get(self.endpoint_url("gettext"))
            .query(&Self::example_query(update_id, language, example_id));
        let response: TextResponse = self.execute("gettext", request).await?;
        Ok(response.get_text)
    }

    async fn report_failure(&self, update_id: &str) -> BackendResult<()> {
        debug!(update_id, "Reporting training failure");

        let request =
            self.client.post(self.endpoint_url("trainfail")).form(&[("update_id", update_id)]);
        self.execute_ack("trainfail", request).await
    }

    async fn report_log(&self, update_id: &str, transcript: &str) -> BackendResult<()> {
        debug!(update_id, transcript_len = transcript.len(), "Reporting training log");

        let request = self
            .client
            .post(self.endpoint_url("traininglog"))
            .form(&[("update_id", update_id), ("training_log", transcript)]);
        self.execute_ack("traininglog", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn example_query(example_id: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("update_id".into(), "5".into()),
            Matcher::UrlEncoded("language".into(), "en".into()),
            Matcher::UrlEncoded("example_id".into(), example_id.into()),
        ])
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::with_base_url("http://backend.local/").unwrap();
        assert_eq!(backend.base_url(), "http://backend.local");
        assert_eq!(
            backend.endpoint_url("gettext"),
            "http://backend.local/v2/repository/nlp/authorization/train/gettext/"
        );
    }

    #[tokio::test]
    async fn test_start_training_parses_request() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/v2/repository/nlp/authorization/train/starttraining/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("update_id".into(), "5".into()),
                Matcher::UrlEncoded("by_user".into(), "9".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "update_id": 5,
                    "language": "en",
                    "repository_uuid": "0b5c9a9e-repo",
                    "examples": [
                        {"example_id": 11, "example_intent": "greet"},
                        {"example_id": 12, "example_intent": "bye"}
                    ],
                    "label_examples_query": [{"example_id": 13}],
                    "algorithm": "neural_network_internal"
                }"#,
            )
            .create_async()
            .await;

        let backend = HttpBackend::with_base_url(server.url()).unwrap();
        let request = backend.start_training("5", "9").await.unwrap();

        assert_eq!(request.update_id, "5");
        assert_eq!(request.by, "9");
        assert_eq!(request.language, "en");
        assert_eq!(request.repository_uuid, "0b5c9a9e-repo");
        assert_eq!(request.examples.len(), 2);
        assert_eq!(request.examples[1].intent, "bye");
        assert_eq!(request.label_examples[0].example_id, ExampleId::from("13"));
        assert!(request.settings.contains_key("algorithm"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_entities_and_text() {
        let mut server = mockito::Server::new_async().await;

        let entities = server
            .mock("GET", "/v2/repository/nlp/authorization/train/getentities/")
            .match_query(example_query("11"))
            .with_status(200)
            .with_body(r#"{"entities": [{"start": 0, "end": 5, "entity": "greeting", "value": "hello"}]}"#)
            .create_async()
            .await;
        let label_entities = server
            .mock("GET", "/v2/repository/nlp/authorization/train/getentitieslabel/")
            .match_query(example_query("11"))
            .with_status(200)
            .with_body(r#"{"entities": []}"#)
            .create_async()
            .await;
        let text = server
            .mock("GET", "/v2/repository/nlp/authorization/train/gettext/")
            .match_query(example_query("11"))
            .with_status(200)
            .with_body(r#"{"get_text": "hello there"}"#)
            .create_async()
            .await;

        let backend = HttpBackend::with_base_url(server.url()).unwrap();
        let id = ExampleId::from("11");

        let fetched = backend.get_entities("5", "en", &id).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].entity(), Some("greeting"));

        assert!(backend.get_label_entities("5", "en", &id).await.unwrap().is_empty());
        assert_eq!(backend.get_text("5", "en", &id).await.unwrap(), "hello there");

        entities.assert_async().await;
        label_entities.assert_async().await;
        text.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/v2/repository/nlp/authorization/train/gettext/")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let backend = HttpBackend::with_base_url(server.url()).unwrap();
        let result = backend.get_text("5", "en", &ExampleId::from("1")).await;

        match result.unwrap_err() {
            BackendError::Status { endpoint, status, body } => {
                assert_eq!(endpoint, "gettext");
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("Expected Status error, got {other:?}"),
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_response_is_reported() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v2/repository/nlp/authorization/train/starttraining/")
            .with_status(200)
            .with_body(r#"{"language": "en"}"#)
            .create_async()
            .await;

        let backend = HttpBackend::with_base_url(server.url()).unwrap();
        let err = backend.start_training("5", "9").await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed { endpoint: "starttraining", .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is not expected to serve HTTP.
        let backend = HttpBackend::new(&BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: Some(2),
        })
        .unwrap();

        let err = backend.report_failure("5").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport { endpoint: "trainfail", .. }));
    }

    #[tokio::test]
    async fn test_report_failure_and_log_send_forms() {
        let mut server = mockito::Server::new_async().await;

        let fail = server
            .mock("POST", "/v2/repository/nlp/authorization/train/trainfail/")
            .match_body(Matcher::UrlEncoded("update_id".into(), "5".into()))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let log = server
            .mock("POST", "/v2/repository/nlp/authorization/train/traininglog/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("update_id".into(), "5".into()),
                Matcher::UrlEncoded("training_log".into(), "INFO a\nERROR b".into()),
            ]))
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let backend = HttpBackend::with_base_url(server.url()).unwrap();
        backend.report_failure("5").await.unwrap();
        backend.report_log("5", "INFO a\nERROR b").await.unwrap();

        fail.assert_async().await;
        log.assert_async().await;
    }
}
