//! Persistence and cache layer.
//!
//! Every generated unit is written through right after it succeeds, so the
//! persisted record doubles as the cache: a recipe whose media is already
//! stored is never sent to the provider again.

use std::sync::Arc;

use platecast_models::{ArtifactKind, RecipeId, RecipeMediaState, StepMediaResult};

use crate::error::{WorkerError, WorkerResult};
use crate::store::MediaStore;

/// What the cache holds for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedMedia {
    Steps(Vec<StepMediaResult>),
    FinalVideo(String),
}

#[derive(Clone)]
pub struct MediaCache {
    store: Arc<dyn MediaStore>,
}

impl MediaCache {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, recipe_id: &RecipeId) -> WorkerResult<Option<RecipeMediaState>> {
        self.store.load(recipe_id).await
    }

    /// Whether `kind` has complete output stored.
    pub async fn has_cached(&self, recipe_id: &RecipeId, kind: ArtifactKind) -> WorkerResult<bool> {
        Ok(self
            .load(recipe_id)
            .await?
            .is_some_and(|state| state.has_output(kind)))
    }

    pub async fn get_cached(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
    ) -> WorkerResult<Option<CachedMedia>> {
        let Some(state) = self.load(recipe_id).await? else {
            return Ok(None);
        };
        if !state.has_output(kind) {
            return Ok(None);
        }

        Ok(match kind {
            ArtifactKind::FinalVideo => state.final_video_url.map(CachedMedia::FinalVideo),
            _ => Some(CachedMedia::Steps(state.steps(kind).to_vec())),
        })
    }

    /// Persist a step result. Returns `false` if a completed entry was kept.
    pub async fn write_through(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        result: &StepMediaResult,
    ) -> WorkerResult<bool> {
        if kind == ArtifactKind::FinalVideo {
            return Err(WorkerError::validation(
                "final video is written with write_final_video",
            ));
        }
        self.store.write_step(recipe_id, kind, result).await
    }

    pub async fn write_final_video(&self, recipe_id: &RecipeId, url: &str) -> WorkerResult<bool> {
        self.store.write_final_video(recipe_id, url).await
    }
}
