//! Structured generation logging.
//!
//! Lifecycle messages for one recipe operation carry the same `recipe_id` and
//! `operation` fields so a whole batch can be followed in the logs.

use platecast_models::RecipeId;
use tracing::{error, info, warn, Span};

/// Logger bound to one recipe and one operation (e.g. "step_images").
#[derive(Debug, Clone)]
pub struct GenerationLogger {
    recipe_id: String,
    operation: String,
}

impl GenerationLogger {
    pub fn new(recipe_id: &RecipeId, operation: &str) -> Self {
        Self {
            recipe_id: recipe_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            recipe_id = %self.recipe_id,
            operation = %self.operation,
            "Generation started: {}", message
        );
    }

    pub fn log_progress(&self, step_index: u32, message: &str) {
        info!(
            recipe_id = %self.recipe_id,
            operation = %self.operation,
            step_index,
            "Generation progress: {}", message
        );
    }

    pub fn log_warning(&self, step_index: Option<u32>, message: &str) {
        warn!(
            recipe_id = %self.recipe_id,
            operation = %self.operation,
            step_index = ?step_index,
            "Generation warning: {}", message
        );
    }

    /// Generated output that could not be stored. The provider URL is logged
    /// because it is the only remaining handle on the artifact.
    pub fn log_persistence_failure(&self, step_index: Option<u32>, provider_url: &str, message: &str) {
        error!(
            recipe_id = %self.recipe_id,
            operation = %self.operation,
            step_index = ?step_index,
            provider_url = %provider_url,
            "Generated media lost: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            recipe_id = %self.recipe_id,
            operation = %self.operation,
            "Generation completed: {}", message
        );
    }

    pub fn recipe_id(&self) -> &str {
        &self.recipe_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation",
            recipe_id = %self.recipe_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_fields() {
        let recipe_id = RecipeId::from_string("recipe-123");
        let logger = GenerationLogger::new(&recipe_id, "step_videos");

        assert_eq!(logger.recipe_id(), "recipe-123");
        assert_eq!(logger.operation(), "step_videos");
    }
}
