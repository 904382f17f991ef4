//! Provider request/response types.

use platecast_models::{AspectRatio, GenerationKind, TaskStatus};
use serde::{Deserialize, Serialize};

/// A generation request as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    /// Required for image-to-video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,
    pub duration_seconds: u32,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl SubmitRequest {
    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            kind: GenerationKind::ImageFromText,
            prompt: prompt.into(),
            source_image_url: None,
            duration_seconds: 0,
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn video(
        prompt: impl Into<String>,
        source_image_url: impl Into<String>,
        duration_seconds: u32,
    ) -> Self {
        Self {
            kind: GenerationKind::ImageToVideo,
            prompt: prompt.into(),
            source_image_url: Some(source_image_url.into()),
            duration_seconds,
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Same request with a different prompt.
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..self.clone()
        }
    }
}

/// Snapshot of a remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPoll {
    pub status: TaskStatus,
    /// Temporary provider URL of the artifact, present once succeeded
    pub output_url: Option<String>,
    pub failure_reason: Option<String>,
}

impl TaskPoll {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            output_url: None,
            failure_reason: None,
        }
    }

    pub fn succeeded(output_url: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            output_url: Some(output_url.into()),
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            output_url: None,
            failure_reason: Some(reason.into()),
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextToImageBody<'a> {
    pub prompt_text: &'a str,
    pub model: &'a str,
    pub ratio: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageToVideoBody<'a> {
    pub prompt_image: &'a str,
    pub prompt_text: &'a str,
    pub model: &'a str,
    pub ratio: &'a str,
    pub duration: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskResponse {
    #[allow(dead_code)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub failure_code: Option<String>,
}

impl TaskResponse {
    pub(crate) fn into_poll(self) -> TaskPoll {
        let status = TaskStatus::from_provider(&self.status);
        let failure_reason = match (self.failure, self.failure_code) {
            (Some(msg), Some(code)) => Some(format!("{msg} ({code})")),
            (Some(msg), None) => Some(msg),
            (None, Some(code)) => Some(code),
            (None, None) if status.is_terminal() && status != TaskStatus::Succeeded => {
                Some(format!("task {}", status.as_str()))
            }
            (None, None) => None,
        };

        TaskPoll {
            status,
            output_url: self.output.and_then(|o| o.into_iter().next()),
            failure_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_response_mapping() {
        let resp: TaskResponse = serde_json::from_str(
            r#"{"id": "t1", "status": "SUCCEEDED", "output": ["https://cdn.provider/t1.mp4"]}"#,
        )
        .unwrap();
        let poll = resp.into_poll();
        assert_eq!(poll.status, TaskStatus::Succeeded);
        assert_eq!(poll.output_url.as_deref(), Some("https://cdn.provider/t1.mp4"));

        let resp: TaskResponse = serde_json::from_str(
            r#"{"id": "t2", "status": "FAILED", "failure": "Content moderated", "failureCode": "SAFETY"}"#,
        )
        .unwrap();
        let poll = resp.into_poll();
        assert_eq!(poll.status, TaskStatus::Failed);
        assert_eq!(poll.failure_reason.as_deref(), Some("Content moderated (SAFETY)"));
    }

    #[test]
    fn test_cancelled_without_reason() {
        let resp: TaskResponse =
            serde_json::from_str(r#"{"id": "t3", "status": "CANCELLED"}"#).unwrap();
        let poll = resp.into_poll();
        assert_eq!(poll.failure_reason.as_deref(), Some("task cancelled"));
    }

    #[test]
    fn test_with_prompt_keeps_source() {
        let req = SubmitRequest::video("a", "https://x/y.png", 5);
        let alt = req.with_prompt("b");
        assert_eq!(alt.prompt, "b");
        assert_eq!(alt.source_image_url, req.source_image_url);
    }
}
