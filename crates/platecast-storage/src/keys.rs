//! Object key layout for recipe media.
//!
//! Keys are deterministic per `(recipe_id, kind, step_index)` so a repeated
//! upload of the same unit overwrites instead of leaking objects:
//!
//! ```text
//! recipes/{recipe_id}/step_images/step_00.png
//! recipes/{recipe_id}/step_videos/step_03.mp4
//! recipes/{recipe_id}/final_video/final.mp4
//! ```

use platecast_models::{ArtifactKind, RecipeId};

use crate::error::{StorageError, StorageResult};

/// Key for one step's artifact.
pub fn step_media_key(recipe_id: &RecipeId, kind: ArtifactKind, step_index: u32) -> String {
    let ext = kind.generation_kind().file_extension();
    format!(
        "recipes/{}/{}/step_{:02}.{}",
        recipe_id.as_str(),
        kind.as_str(),
        step_index,
        ext
    )
}

/// Key for the recipe's composite video.
pub fn final_video_key(recipe_id: &RecipeId) -> String {
    format!(
        "recipes/{}/{}/final.mp4",
        recipe_id.as_str(),
        ArtifactKind::FinalVideo.as_str()
    )
}

/// Reject keys that would escape the bucket prefix or break public URLs.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
        || key.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}
