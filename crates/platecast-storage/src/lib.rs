//! Object storage for generated recipe media.
//!
//! Provider output URLs are temporary. Every accepted artifact is copied into
//! Cloudflare R2 and only the resulting permanent URL is ever persisted.

pub mod client;
pub mod error;
pub mod keys;

pub use client::{public_object_url, MemoryObjectStore, ObjectStore, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{final_video_key, step_media_key, validate_key};
