//! Test doubles for the provider, fetcher and storage seams.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use platecast_models::{
    ArtifactKind, GenerationKind, RecipeId, RecipeMediaState, StepMediaResult, TaskId,
};
use platecast_provider::{GenerationProvider, ProviderResult, SubmitRequest, TaskPoll};
use platecast_storage::{ObjectStore, StorageError, StorageResult};

use crate::error::{WorkerError, WorkerResult};
use crate::fetch::ArtifactFetcher;
use crate::store::MediaStore;

#[derive(Debug, Clone)]
enum TaskBehaviour {
    Succeed(String),
    Fail,
    Hang,
}

#[derive(Default)]
struct ProviderState {
    requests: Vec<SubmitRequest>,
    polls: u32,
    script: VecDeque<TaskPoll>,
    hang_on: Vec<String>,
    fail_on: Vec<String>,
    tasks: HashMap<String, TaskBehaviour>,
}

/// Provider that succeeds by default with `https://provider.test/out/{n}.{ext}`,
/// `n` being the 1-based submission number.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue poll responses, served before any per-task behaviour.
    pub fn script(&self, polls: Vec<TaskPoll>) {
        self.state.lock().unwrap().script.extend(polls);
    }

    /// Tasks whose prompt contains `needle` never finish.
    pub fn hang_when(&self, needle: &str) {
        self.state.lock().unwrap().hang_on.push(needle.to_string());
    }

    /// Tasks whose prompt contains `needle` fail.
    pub fn fail_when(&self, needle: &str) {
        self.state.lock().unwrap().fail_on.push(needle.to_string());
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn poll_count(&self) -> u32 {
        self.state.lock().unwrap().polls
    }

    pub fn requests(&self) -> Vec<SubmitRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn submit(&self, request: &SubmitRequest) -> ProviderResult<TaskId> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let n = state.requests.len();

        let behaviour = if state.hang_on.iter().any(|s| request.prompt.contains(s.as_str())) {
            TaskBehaviour::Hang
        } else if state.fail_on.iter().any(|s| request.prompt.contains(s.as_str())) {
            TaskBehaviour::Fail
        } else {
            let ext = match request.kind {
                GenerationKind::ImageFromText => "png",
                GenerationKind::ImageToVideo => "mp4",
            };
            TaskBehaviour::Succeed(format!("https://provider.test/out/{}.{}", n, ext))
        };

        let id = format!("task-{}", n);
        state.tasks.insert(id.clone(), behaviour);
        Ok(TaskId::from_string(id))
    }

    async fn poll(&self, task_id: &TaskId) -> ProviderResult<TaskPoll> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        if let Some(scripted) = state.script.pop_front() {
            return Ok(scripted);
        }

        Ok(match state.tasks.get(task_id.as_str()) {
            Some(TaskBehaviour::Succeed(url)) => TaskPoll::succeeded(url.clone()),
            Some(TaskBehaviour::Fail) => TaskPoll::failed("generation failed"),
            Some(TaskBehaviour::Hang) | None => TaskPoll::pending(),
        })
    }
}

/// Fetcher with configurable sizes. Unknown URLs are unreachable unless a
/// default length is set.
#[derive(Default)]
pub struct FakeFetcher {
    lengths: Mutex<HashMap<String, u64>>,
    default_length: Option<u64>,
    downloads: Mutex<u32>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_length(length: u64) -> Self {
        Self {
            default_length: Some(length),
            ..Self::default()
        }
    }

    pub fn set_length(&self, url: &str, length: u64) {
        self.lengths.lock().unwrap().insert(url.to_string(), length);
    }

    pub fn download_count(&self) -> u32 {
        *self.downloads.lock().unwrap()
    }

    fn length_of(&self, url: &str) -> WorkerResult<u64> {
        self.lengths
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .or(self.default_length)
            .ok_or_else(|| WorkerError::download_failed(format!("{} not found", url)))
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn content_length(&self, url: &str) -> WorkerResult<Option<u64>> {
        self.length_of(url).map(Some)
    }

    async fn download(&self, url: &str) -> WorkerResult<Vec<u8>> {
        self.length_of(url)?;
        *self.downloads.lock().unwrap() += 1;
        Ok(url.as_bytes().to_vec())
    }
}

/// Object store whose uploads always fail.
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, key: &str, _data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        Err(StorageError::upload_failed(format!("bucket unavailable for {}", key)))
    }
}

/// Media store that reads as empty and rejects every write.
pub struct FailingMediaStore;

#[async_trait]
impl MediaStore for FailingMediaStore {
    async fn load(&self, _recipe_id: &RecipeId) -> WorkerResult<Option<RecipeMediaState>> {
        Ok(None)
    }

    async fn write_step(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        _result: &StepMediaResult,
    ) -> WorkerResult<bool> {
        Err(WorkerError::persistence(format!(
            "media record for {} {} unavailable",
            recipe_id, kind
        )))
    }

    async fn write_final_video(&self, recipe_id: &RecipeId, _url: &str) -> WorkerResult<bool> {
        Err(WorkerError::persistence(format!(
            "media record for {} unavailable",
            recipe_id
        )))
    }
}
