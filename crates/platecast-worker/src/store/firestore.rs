//! Firestore-backed stores.

use async_trait::async_trait;
use platecast_firestore::{FirestoreClient, RecipeMediaRepository, UserCreditsRepository};
use platecast_models::{
    ArtifactKind, CreditMutation, MutationOutcome, RecipeId, RecipeMediaState, StepMediaResult,
    UserCredits,
};
use tracing::debug;

use super::{CreditStore, MediaStore};
use crate::error::WorkerResult;

#[derive(Clone)]
pub struct FirestoreMediaStore {
    repo: RecipeMediaRepository,
}

impl FirestoreMediaStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            repo: RecipeMediaRepository::new(client),
        }
    }
}

#[async_trait]
impl MediaStore for FirestoreMediaStore {
    async fn load(&self, recipe_id: &RecipeId) -> WorkerResult<Option<RecipeMediaState>> {
        Ok(self.repo.load(recipe_id).await?)
    }

    async fn write_step(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        result: &StepMediaResult,
    ) -> WorkerResult<bool> {
        Ok(self.repo.write_step(recipe_id, kind, result).await?)
    }

    async fn write_final_video(&self, recipe_id: &RecipeId, url: &str) -> WorkerResult<bool> {
        Ok(self.repo.write_final_video(recipe_id, url).await?)
    }
}

#[derive(Clone)]
pub struct FirestoreCreditStore {
    client: FirestoreClient,
}

impl FirestoreCreditStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CreditStore for FirestoreCreditStore {
    async fn apply(
        &self,
        user_id: &str,
        mutation: CreditMutation,
    ) -> WorkerResult<(UserCredits, MutationOutcome)> {
        let repo = UserCreditsRepository::new(self.client.clone(), user_id);
        let (credits, outcome) = repo.apply(mutation).await?;
        if outcome.month_reset {
            debug!(user_id = %user_id, "Monthly fair-use counter reset");
        }
        Ok((credits, outcome))
    }
}
