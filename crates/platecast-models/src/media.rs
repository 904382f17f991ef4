//! Per-step media results and the per-recipe media aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::recipe::RecipeId;
use crate::task::GenerationKind;

/// Status of one step's generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Generating => "generating",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "generating" => MediaStatus::Generating,
            "completed" => MediaStatus::Completed,
            "failed" => MediaStatus::Failed,
            _ => MediaStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Failed)
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step's generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMediaResult {
    /// 0-based step index, unique within a recipe
    pub step_index: u32,
    /// Permanent storage URL once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub status: MediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepMediaResult {
    pub fn pending(step_index: u32) -> Self {
        Self {
            step_index,
            media_url: None,
            status: MediaStatus::Pending,
            error: None,
        }
    }

    pub fn generating(step_index: u32) -> Self {
        Self {
            status: MediaStatus::Generating,
            ..Self::pending(step_index)
        }
    }

    pub fn completed(step_index: u32, media_url: impl Into<String>) -> Self {
        Self {
            step_index,
            media_url: Some(media_url.into()),
            status: MediaStatus::Completed,
            error: None,
        }
    }

    pub fn failed(step_index: u32, error: impl Into<String>) -> Self {
        Self {
            step_index,
            media_url: None,
            status: MediaStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == MediaStatus::Completed
    }
}

/// Cache key dimension for persisted media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    StepImages,
    StepVideos,
    FinalVideo,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::StepImages => "step_images",
            ArtifactKind::StepVideos => "step_videos",
            ArtifactKind::FinalVideo => "final_video",
        }
    }

    /// Provider generation kind used to produce this artifact.
    pub fn generation_kind(&self) -> GenerationKind {
        match self {
            ArtifactKind::StepImages => GenerationKind::ImageFromText,
            ArtifactKind::StepVideos | ArtifactKind::FinalVideo => GenerationKind::ImageToVideo,
        }
    }

    /// Noun used in user-facing progress messages.
    pub fn unit_noun(&self) -> &'static str {
        match self {
            ArtifactKind::StepImages => "step photos",
            ArtifactKind::StepVideos => "step videos",
            ArtifactKind::FinalVideo => "final videos",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate media state for one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeMediaState {
    pub recipe_id: RecipeId,
    #[serde(default)]
    pub step_images: Vec<StepMediaResult>,
    #[serde(default)]
    pub step_videos: Vec<StepMediaResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl RecipeMediaState {
    pub fn new(recipe_id: RecipeId) -> Self {
        Self {
            recipe_id,
            step_images: Vec::new(),
            step_videos: Vec::new(),
            final_video_url: None,
            generated_at: None,
        }
    }

    /// Step results for a step artifact kind (empty for the final video).
    pub fn steps(&self, kind: ArtifactKind) -> &[StepMediaResult] {
        match kind {
            ArtifactKind::StepImages => &self.step_images,
            ArtifactKind::StepVideos => &self.step_videos,
            ArtifactKind::FinalVideo => &[],
        }
    }

    fn steps_mut(&mut self, kind: ArtifactKind) -> Option<&mut Vec<StepMediaResult>> {
        match kind {
            ArtifactKind::StepImages => Some(&mut self.step_images),
            ArtifactKind::StepVideos => Some(&mut self.step_videos),
            ArtifactKind::FinalVideo => None,
        }
    }

    /// Look up one step's result.
    pub fn step(&self, kind: ArtifactKind, step_index: u32) -> Option<&StepMediaResult> {
        self.steps(kind).iter().find(|r| r.step_index == step_index)
    }

    /// Insert or replace a step result, keeping entries ordered by index.
    ///
    /// Returns `false` without changing anything when the existing entry is
    /// already completed: completed results are immutable.
    pub fn upsert_step(&mut self, kind: ArtifactKind, result: StepMediaResult) -> bool {
        let Some(steps) = self.steps_mut(kind) else {
            return false;
        };

        match steps.iter().position(|r| r.step_index == result.step_index) {
            Some(pos) if steps[pos].is_completed() => return false,
            Some(pos) => steps[pos] = result,
            None => {
                steps.push(result);
                steps.sort_by_key(|r| r.step_index);
            }
        }

        self.generated_at = Some(Utc::now());
        true
    }

    /// Whether every one of `expected_steps` steps is completed.
    pub fn all_completed(&self, kind: ArtifactKind, expected_steps: usize) -> bool {
        let steps = self.steps(kind);
        expected_steps > 0
            && steps.len() == expected_steps
            && steps
                .iter()
                .enumerate()
                .all(|(i, r)| r.step_index as usize == i && r.is_completed())
    }

    /// Whether this kind has any persisted output worth serving from cache.
    pub fn has_output(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::FinalVideo => self.final_video_url.is_some(),
            _ => {
                let steps = self.steps(kind);
                !steps.is_empty() && steps.iter().all(|r| r.is_completed())
            }
        }
    }

    /// Set the final video URL. Only allowed once all step videos completed.
    pub fn set_final_video(&mut self, url: impl Into<String>) -> bool {
        let expected = self.step_videos.len();
        if !self.all_completed(ArtifactKind::StepVideos, expected) {
            return false;
        }
        self.final_video_url = Some(url.into());
        self.generated_at = Some(Utc::now());
        true
    }

    /// Caller-facing persisted record shape.
    pub fn to_record(&self) -> RecipeMediaRecord {
        RecipeMediaRecord {
            step_images: self
                .step_images
                .iter()
                .filter_map(|r| {
                    r.media_url.as_ref().map(|url| StepImageRecord {
                        step_index: r.step_index,
                        image_url: url.clone(),
                    })
                })
                .collect(),
            step_videos: self
                .step_videos
                .iter()
                .map(|r| StepVideoRecord {
                    step_index: r.step_index,
                    video_url: r.media_url.clone(),
                    status: r.status,
                })
                .collect(),
            final_video_url: self.final_video_url.clone(),
        }
    }
}

/// Persisted media sub-document as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMediaRecord {
    pub step_images: Vec<StepImageRecord>,
    pub step_videos: Vec<StepVideoRecord>,
    pub final_video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepImageRecord {
    pub step_index: u32,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepVideoRecord {
    pub step_index: u32,
    pub video_url: Option<String>,
    pub status: MediaStatus,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    Failed,
}

/// Counts for a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub kind: ArtifactKind,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub status: BatchStatus,
}

impl BatchSummary {
    /// Summarize a batch. A batch with no steps counts as completed since
    /// nothing failed.
    pub fn from_results(kind: ArtifactKind, results: &[StepMediaResult]) -> Self {
        let completed = results.iter().filter(|r| r.is_completed()).count();
        let failed = results
            .iter()
            .filter(|r| r.status == MediaStatus::Failed)
            .count();
        let status = if results.is_empty() || completed > 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::Failed
        };

        Self {
            kind,
            total: results.len(),
            completed,
            failed,
            status,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.completed > 0 && self.completed < self.total
    }

    /// User-facing message, e.g. "Generated 7 of 10 step photos".
    pub fn message(&self) -> String {
        format!(
            "Generated {} of {} {}",
            self.completed,
            self.total,
            self.kind.unit_noun()
        )
    }
}
