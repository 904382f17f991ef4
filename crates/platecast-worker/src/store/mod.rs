//! Storage seams for media state and user credits.
//!
//! The engine only talks to these traits. Firestore backs them in production;
//! the in-memory versions serve local runs and tests.

mod firestore;
mod memory;

use async_trait::async_trait;
use platecast_models::{
    ArtifactKind, CreditMutation, MutationOutcome, RecipeId, RecipeMediaState, StepMediaResult,
    UserCredits,
};

use crate::error::WorkerResult;

pub use firestore::{FirestoreCreditStore, FirestoreMediaStore};
pub use memory::{MemoryCreditStore, MemoryMediaStore};

/// Per-recipe media persistence.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn load(&self, recipe_id: &RecipeId) -> WorkerResult<Option<RecipeMediaState>>;

    /// Persist one step result. `Ok(false)` if a completed entry already exists.
    async fn write_step(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        result: &StepMediaResult,
    ) -> WorkerResult<bool>;

    /// `Ok(false)` unless every step video is completed.
    async fn write_final_video(&self, recipe_id: &RecipeId, url: &str) -> WorkerResult<bool>;
}

/// Per-user credit persistence. `apply` must be atomic.
#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn apply(
        &self,
        user_id: &str,
        mutation: CreditMutation,
    ) -> WorkerResult<(UserCredits, MutationOutcome)>;
}
