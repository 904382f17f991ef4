//! Firestore REST API client.
//!
//! This crate provides:
//! - Recipe media repository with per-step nested writes
//! - User credits repository with atomic, optimistic-locked mutations
//! - Service account authentication via gcp_auth, or a fixed emulator token
//! - Retry with backoff and request metrics

pub mod client;
pub mod error;
pub mod metrics;
pub mod recipe_media_repo;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod user_credits;


pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use recipe_media_repo::{step_field_key, RecipeMediaRepository};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use user_credits::UserCreditsRepository;
