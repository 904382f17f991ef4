//! Remote generation tasks.
//!
//! A [`GenerationTask`] mirrors one job on the external provider. It lives only
//! for the duration of a single submit-and-poll attempt; only its output is
//! ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a task generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Still image from a text prompt
    ImageFromText,
    /// Short clip animated from a source image
    ImageToVideo,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::ImageFromText => "image_from_text",
            GenerationKind::ImageToVideo => "image_to_video",
        }
    }

    /// MIME type of the artifact this kind produces.
    pub fn content_type(&self) -> &'static str {
        match self {
            GenerationKind::ImageFromText => "image/png",
            GenerationKind::ImageToVideo => "video/mp4",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            GenerationKind::ImageFromText => "png",
            GenerationKind::ImageToVideo => "mp4",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-reported task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more polling needed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Map a provider status string (case-insensitive).
    ///
    /// Unknown and throttled states are treated as still pending so the
    /// poll loop keeps waiting until the per-attempt timeout.
    pub fn from_provider(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" | "IN_PROGRESS" | "PROCESSING" => TaskStatus::Running,
            "SUCCEEDED" | "SUCCESS" | "COMPLETED" => TaskStatus::Succeeded,
            "FAILED" | "ERROR" => TaskStatus::Failed,
            "CANCELLED" | "CANCELED" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16 short-form vertical
    #[default]
    Portrait,
    /// 16:9
    Landscape,
    /// 1:1
    Square,
}

impl AspectRatio {
    /// Pixel ratio string in the provider's `W:H` format.
    pub fn as_provider_ratio(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "720:1280",
            AspectRatio::Landscape => "1280:720",
            AspectRatio::Square => "960:960",
        }
    }

    /// Human-readable ratio used in prompt boilerplate.
    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }
}

/// One remote job, owned by the retry controller for a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Provider task ID
    pub id: TaskId,
    /// Generation kind
    pub kind: GenerationKind,
    /// Last provider-reported status
    pub status: TaskStatus,
    /// 1-based attempt number
    pub attempt: u32,
    /// When the task was submitted
    pub submitted_at: DateTime<Utc>,
    /// Last failure reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl GenerationTask {
    /// Track a freshly submitted task.
    pub fn submitted(id: TaskId, kind: GenerationKind, attempt: u32) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Pending,
            attempt,
            submitted_at: Utc::now(),
            last_error: None,
        }
    }

    /// Record a polled status. Terminal states are sticky.
    pub fn record_status(&mut self, status: TaskStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }

    /// Mark the task failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.last_error = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
