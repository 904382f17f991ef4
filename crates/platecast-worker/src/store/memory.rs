//! In-memory stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use platecast_models::{
    ArtifactKind, CreditMutation, MutationOutcome, RecipeId, RecipeMediaState, StepMediaResult,
    UserCredits,
};
use tokio::sync::Mutex;

use super::{CreditStore, MediaStore};
use crate::error::WorkerResult;

#[derive(Clone, Default)]
pub struct MemoryMediaStore {
    records: Arc<Mutex<HashMap<RecipeId, RecipeMediaState>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn load(&self, recipe_id: &RecipeId) -> WorkerResult<Option<RecipeMediaState>> {
        Ok(self.records.lock().await.get(recipe_id).cloned())
    }

    async fn write_step(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        result: &StepMediaResult,
    ) -> WorkerResult<bool> {
        let mut records = self.records.lock().await;
        let state = records
            .entry(recipe_id.clone())
            .or_insert_with(|| RecipeMediaState::new(recipe_id.clone()));
        Ok(state.upsert_step(kind, result.clone()))
    }

    async fn write_final_video(&self, recipe_id: &RecipeId, url: &str) -> WorkerResult<bool> {
        let mut records = self.records.lock().await;
        Ok(records
            .get_mut(recipe_id)
            .map(|state| state.set_final_video(url))
            .unwrap_or(false))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCreditStore {
    users: Arc<Mutex<HashMap<String, UserCredits>>>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a user's record.
    pub async fn insert(&self, credits: UserCredits) {
        self.users
            .lock()
            .await
            .insert(credits.user_id.clone(), credits);
    }
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn apply(
        &self,
        user_id: &str,
        mutation: CreditMutation,
    ) -> WorkerResult<(UserCredits, MutationOutcome)> {
        let now = Utc::now();
        let mut users = self.users.lock().await;
        let credits = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserCredits::new(user_id, now));
        let outcome = credits.apply(mutation, now);
        Ok((credits.clone(), outcome))
    }
}
