//! Client for the remote media-generation provider.
//!
//! Generation is asynchronous on the provider side: a request is submitted,
//! a task id comes back, and the task is polled until it reaches a terminal
//! state. This crate only speaks the wire protocol; retries, backoff and
//! quality checks live in the worker.

pub mod client;
pub mod error;
pub mod types;
pub mod validation;

pub use client::{GenerationProvider, ProviderClient, ProviderConfig};
pub use error::{ProviderError, ProviderResult};
pub use types::{SubmitRequest, TaskPoll};
pub use validation::{validate_duration, validate_prompt, validate_source_image};
