//! Provider HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use platecast_models::{GenerationKind, TaskId};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::types::{
    CreateTaskResponse, ErrorBody, ImageToVideoBody, SubmitRequest, TaskPoll, TaskResponse,
    TextToImageBody,
};
use crate::validation::{validate_duration, validate_prompt, validate_source_image};

const DEFAULT_BASE_URL: &str = "https://api.dev.runwayml.com";
const DEFAULT_API_VERSION: &str = "2024-11-06";
const API_VERSION_HEADER: &str = "X-Runway-Version";

/// Submit-and-poll contract the generation engine is written against.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit a generation job and return the provider task id.
    async fn submit(&self, request: &SubmitRequest) -> ProviderResult<TaskId>;

    /// Fetch the current state of a task. Terminal failures are data, not errors.
    async fn poll(&self, task_id: &TaskId) -> ProviderResult<TaskPoll>;
}

/// Configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key (bearer token)
    pub api_key: String,
    /// Base URL of the provider API
    pub base_url: String,
    /// Model used for text-to-image
    pub image_model: String,
    /// Model used for image-to-video
    pub video_model: String,
    /// Value of the API version header
    pub api_version: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: "gen4_image".to_string(),
            video_model: "gen4_turbo".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("PROVIDER_API_KEY")
            .map_err(|_| ProviderError::config_error("PROVIDER_API_KEY not set"))?;
        if api_key.trim().is_empty() {
            return Err(ProviderError::config_error("PROVIDER_API_KEY is empty"));
        }

        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: std::env::var("PROVIDER_BASE_URL").unwrap_or(defaults.base_url.clone()),
            image_model: std::env::var("PROVIDER_MODEL_IMAGE")
                .unwrap_or(defaults.image_model.clone()),
            video_model: std::env::var("PROVIDER_MODEL_VIDEO")
                .unwrap_or(defaults.video_model.clone()),
            api_version: std::env::var("PROVIDER_API_VERSION")
                .unwrap_or(defaults.api_version.clone()),
            timeout: Duration::from_secs(
                std::env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            ..defaults
        })
    }
}

/// HTTP client for the generation provider.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Create a new provider client.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ProviderConfig::from_env()?)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Check that the provider is reachable and the key is accepted.
    pub async fn health_check(&self) -> ProviderResult<bool> {
        let url = format!("{}/v1/organization", self.base_url());

        match self.authorized(self.http.get(&url)).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Provider health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Provider health check error: {}", e);
                Ok(false)
            }
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header(API_VERSION_HEADER, &self.config.api_version)
    }

    /// Turn non-2xx responses into `ProviderError::Api`.
    async fn check_status(response: Response) -> ProviderResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or(body);

        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GenerationProvider for ProviderClient {
    async fn submit(&self, request: &SubmitRequest) -> ProviderResult<TaskId> {
        validate_prompt(&request.prompt)?;
        validate_duration(request.kind, request.duration_seconds)?;

        let ratio = request.aspect_ratio.as_provider_ratio();
        let builder = match request.kind {
            GenerationKind::ImageFromText => {
                let url = format!("{}/v1/text_to_image", self.base_url());
                self.http.post(url).json(&TextToImageBody {
                    prompt_text: &request.prompt,
                    model: &self.config.image_model,
                    ratio,
                })
            }
            GenerationKind::ImageToVideo => {
                let source = request.source_image_url.as_deref().ok_or_else(|| {
                    ProviderError::validation("image-to-video requires a source image")
                })?;
                let source = validate_source_image(source)?;
                let url = format!("{}/v1/image_to_video", self.base_url());
                self.http.post(url).json(&ImageToVideoBody {
                    prompt_image: &source,
                    prompt_text: &request.prompt,
                    model: &self.config.video_model,
                    ratio,
                    duration: request.duration_seconds,
                })
            }
        };

        debug!(kind = %request.kind, "Submitting generation task");

        let response = self.authorized(builder).send().await?;
        let created: CreateTaskResponse = Self::check_status(response).await?.json().await?;

        if created.id.is_empty() {
            return Err(ProviderError::invalid_response("provider returned an empty task id"));
        }

        info!(kind = %request.kind, task_id = %created.id, "Generation task submitted");
        Ok(TaskId::from_string(created.id))
    }

    async fn poll(&self, task_id: &TaskId) -> ProviderResult<TaskPoll> {
        let url = format!(
            "{}/v1/tasks/{}",
            self.base_url(),
            urlencoding::encode(task_id.as_str())
        );

        let response = self.authorized(self.http.get(&url)).send().await?;
        let task: TaskResponse = Self::check_status(response).await?.json().await?;
        let poll = task.into_poll();

        debug!(task_id = %task_id, status = %poll.status, "Polled generation task");
        Ok(poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platecast_models::TaskStatus;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ProviderClient {
        ProviderClient::new(ProviderConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_submit_image_to_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/image_to_video"))
            .and(header("authorization", "Bearer test-key"))
            .and(header(API_VERSION_HEADER, DEFAULT_API_VERSION))
            .and(body_partial_json(json!({
                "promptImage": "https://cdn.example.com/step0.png",
                "ratio": "720:1280",
                "duration": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "task-123"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = SubmitRequest::video("sizzling pan", "http://cdn.example.com/step0.png", 5);
        let task_id = client.submit(&request).await.unwrap();
        assert_eq!(task_id.as_str(), "task-123");
    }

    #[tokio::test]
    async fn test_submit_text_to_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text_to_image"))
            .and(body_partial_json(json!({"promptText": "golden crust"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "img-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let task_id = client.submit(&SubmitRequest::image("golden crust")).await.unwrap();
        assert_eq!(task_id.as_str(), "img-1");
    }

    #[tokio::test]
    async fn test_invalid_source_rejected_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = SubmitRequest::video("pan", "file:///tmp/photo.png", 5);
        let err = client.submit(&request).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_poll_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tasks/queued"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "queued", "status": "THROTTLED"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/tasks/done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "done",
                "status": "SUCCEEDED",
                "output": ["https://provider.cdn/done.mp4"]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let poll = client.poll(&TaskId::from_string("queued")).await.unwrap();
        assert_eq!(poll.status, TaskStatus::Pending);

        let poll = client.poll(&TaskId::from_string("done")).await.unwrap();
        assert_eq!(poll.status, TaskStatus::Succeeded);
        assert_eq!(poll.output_url.as_deref(), Some("https://provider.cdn/done.mp4"));
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text_to_image"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "capacity exceeded"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.submit(&SubmitRequest::image("soup")).await.unwrap_err();
        match &err {
            ProviderError::Api { status, message } => {
                assert_eq!(*status, 503);
                assert_eq!(message, "capacity exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/organization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(client_for(&server).health_check().await.unwrap());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("PROVIDER_API_KEY", "env-key");
        std::env::set_var("PROVIDER_TIMEOUT_SECS", "12");
        std::env::remove_var("PROVIDER_BASE_URL");

        let config = ProviderConfig::from_env().unwrap();
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(12));

        std::env::remove_var("PROVIDER_API_KEY");
        std::env::remove_var("PROVIDER_TIMEOUT_SECS");
        assert!(ProviderConfig::from_env().is_err());
    }
}
