//! Recipe media generation engine.
//!
//! This crate provides:
//! - Step image, step video and final video pipelines
//! - Retry, timeout and quality gating around the generation provider
//! - Write-through media cache and the credit ledger
//! - Structured generation logging and metrics

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod quality;
pub mod retry;
pub mod store;

#[cfg(test)]
mod testing;

pub use batch::{BatchReport, BatchSequencer, StepGenerator, StepOutcome};
pub use cache::{CachedMedia, MediaCache};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use ledger::CreditLedger;
pub use logging::GenerationLogger;
pub use pipeline::{FinalVideoOutcome, GenerationPipeline};
pub use quality::QualityGate;
pub use retry::{GenerationOutcome, RetryPolicy};
pub use store::{CreditStore, FirestoreCreditStore, FirestoreMediaStore, MediaStore};
