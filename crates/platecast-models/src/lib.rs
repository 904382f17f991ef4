//! Shared data models for the Platecast backend.
//!
//! This crate provides Serde-serializable types for:
//! - Canonical recipe input and boundary normalization of raw recipe JSON
//! - Remote generation tasks and their provider-reported lifecycle
//! - Per-step media results and the per-recipe media aggregate
//! - User credit balances, plan tiers and the monthly fair-use counter

pub mod credits;
pub mod media;
pub mod recipe;
pub mod task;

// Re-export common types
pub use credits::{
    CreditExhausted, CreditMutation, CreditTrack, Entitlement, MutationOutcome, PlanTier,
    UserCredits, DEFAULT_FAIR_USE_MONTHLY_CAP,
};
pub use media::{
    ArtifactKind, BatchStatus, BatchSummary, MediaStatus, RecipeMediaRecord, RecipeMediaState,
    StepImageRecord, StepMediaResult, StepVideoRecord,
};
pub use recipe::{
    Ingredient, RawRecipe, RecipeError, RecipeId, RecipeInput, Step, MAX_RECIPE_STEPS,
};
pub use task::{AspectRatio, GenerationKind, GenerationTask, TaskId, TaskStatus};
