//! Recipe media repository.
//!
//! One document per recipe at `recipe_media/{recipe_id}`. Step results live
//! in nested maps keyed `step_NN` so each write touches a single entry via a
//! dotted update mask; parallel steps of the same batch never overwrite each
//! other.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platecast_models::{ArtifactKind, MediaStatus, RecipeId, RecipeMediaState, StepMediaResult};
use tracing::{debug, info, warn};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::types::{Document, ToFirestoreValue, Value};

const RECIPE_MEDIA_COLLECTION: &str = "recipe_media";

const MAX_UPDATE_RETRIES: u32 = 5;

/// Map key for a step entry.
pub fn step_field_key(step_index: u32) -> String {
    format!("step_{:02}", step_index)
}

/// Repository for per-recipe media state.
#[derive(Clone)]
pub struct RecipeMediaRepository {
    client: FirestoreClient,
}

impl RecipeMediaRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    async fn read(&self, recipe_id: &RecipeId) -> FirestoreResult<Option<Document>> {
        self.client
            .with_retry("get_recipe_media", || {
                self.client
                    .get_document(RECIPE_MEDIA_COLLECTION, recipe_id.as_str())
            })
            .await
    }

    /// Load the media state for a recipe. `None` if nothing was generated yet.
    pub async fn load(&self, recipe_id: &RecipeId) -> FirestoreResult<Option<RecipeMediaState>> {
        Ok(self
            .read(recipe_id)
            .await?
            .map(|doc| document_to_state(recipe_id, &doc)))
    }

    /// Persist one step result.
    ///
    /// Returns `false` if the stored entry is already completed; completed
    /// results are never overwritten.
    pub async fn write_step(
        &self,
        recipe_id: &RecipeId,
        kind: ArtifactKind,
        result: &StepMediaResult,
    ) -> FirestoreResult<bool> {
        let group = kind.as_str();
        let path = format!("{}.{}", group, step_field_key(result.step_index));

        self.update_with_retry(recipe_id, |state| {
            state
                .upsert_step(kind, result.clone())
                .then(|| vec![path.clone(), "generated_at".to_string()])
        })
        .await
    }

    /// Persist the final video URL. Refused unless every step video completed.
    pub async fn write_final_video(&self, recipe_id: &RecipeId, url: &str) -> FirestoreResult<bool> {
        self.update_with_retry(recipe_id, |state| {
            state
                .set_final_video(url)
                .then(|| vec!["final_video_url".to_string(), "generated_at".to_string()])
        })
        .await
    }

    /// Read-modify-write under an `updateTime` precondition.
    ///
    /// `mutate` returns the field paths it changed, or `None` to abort without
    /// writing. A missing document is created whole.
    async fn update_with_retry<F>(&self, recipe_id: &RecipeId, mutate: F) -> FirestoreResult<bool>
    where
        F: Fn(&mut RecipeMediaState) -> Option<Vec<String>>,
    {
        for attempt in 0..MAX_UPDATE_RETRIES {
            let doc = self.read(recipe_id).await?;

            let (mut state, update_time) = match &doc {
                Some(d) => (document_to_state(recipe_id, d), d.update_time.clone()),
                None => (RecipeMediaState::new(recipe_id.clone()), None),
            };

            let Some(update_mask) = mutate(&mut state) else {
                debug!(recipe_id = %recipe_id, "Media write refused by state rules");
                return Ok(false);
            };

            let mut fields = state_to_fields(&state);

            if update_time.is_none() {
                match self
                    .client
                    .create_document(RECIPE_MEDIA_COLLECTION, recipe_id.as_str(), fields)
                    .await
                {
                    Ok(_) => {
                        info!(recipe_id = %recipe_id, "Created recipe media record");
                        return Ok(true);
                    }
                    Err(FirestoreError::AlreadyExists(_)) => continue,
                    Err(e) => return Err(e),
                }
            }

            // Only send the top-level fields named in the mask.
            fields.retain(|name, _| {
                update_mask
                    .iter()
                    .any(|p| p.split('.').next() == Some(name.as_str()))
            });

            match self
                .client
                .update_document_with_precondition(
                    RECIPE_MEDIA_COLLECTION,
                    recipe_id.as_str(),
                    fields,
                    Some(update_mask),
                    update_time.as_deref(),
                )
                .await
            {
                Ok(_) => return Ok(true),
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        recipe_id = %recipe_id,
                        attempt = attempt + 1,
                        "Recipe media precondition failed, retrying"
                    );
                    record_precondition_conflict(RECIPE_MEDIA_COLLECTION);
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            recipe_id = %recipe_id,
            retries = MAX_UPDATE_RETRIES,
            "Recipe media update failed after retries"
        );
        Err(FirestoreError::request_failed(
            "Failed to update recipe media due to concurrent updates",
        ))
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn step_to_value(result: &StepMediaResult) -> Value {
    let mut entry = HashMap::new();
    entry.insert("step_index".to_string(), result.step_index.to_firestore_value());
    entry.insert("media_url".to_string(), result.media_url.to_firestore_value());
    entry.insert("status".to_string(), result.status.as_str().to_firestore_value());
    entry.insert("error".to_string(), result.error.to_firestore_value());
    Value::map(entry)
}

fn steps_to_value(steps: &[StepMediaResult]) -> Value {
    Value::map(
        steps
            .iter()
            .map(|r| (step_field_key(r.step_index), step_to_value(r)))
            .collect(),
    )
}

fn state_to_fields(state: &RecipeMediaState) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "recipe_id".to_string(),
        state.recipe_id.as_str().to_firestore_value(),
    );
    fields.insert("step_images".to_string(), steps_to_value(&state.step_images));
    fields.insert("step_videos".to_string(), steps_to_value(&state.step_videos));
    fields.insert(
        "final_video_url".to_string(),
        state.final_video_url.to_firestore_value(),
    );
    fields.insert(
        "generated_at".to_string(),
        state.generated_at.to_firestore_value(),
    );
    fields
}

fn value_to_step(value: &Value) -> Option<StepMediaResult> {
    use crate::types::FromFirestoreValue;

    let map = value.as_map()?;
    let get_str = |k: &str| map.get(k).and_then(String::from_firestore_value);

    Some(StepMediaResult {
        step_index: map.get("step_index").and_then(u32::from_firestore_value)?,
        media_url: get_str("media_url"),
        status: get_str("status")
            .map(|s| MediaStatus::from_str(&s))
            .unwrap_or_default(),
        error: get_str("error"),
    })
}

fn value_to_steps(value: Option<&Value>) -> Vec<StepMediaResult> {
    let mut steps: Vec<StepMediaResult> = value
        .and_then(Value::as_map)
        .map(|m| m.values().filter_map(value_to_step).collect())
        .unwrap_or_default();
    steps.sort_by_key(|r| r.step_index);
    steps
}

fn document_to_state(recipe_id: &RecipeId, doc: &Document) -> RecipeMediaState {
    RecipeMediaState {
        recipe_id: recipe_id.clone(),
        step_images: value_to_steps(doc.field("step_images")),
        step_videos: value_to_steps(doc.field("step_videos")),
        final_video_url: doc.get("final_video_url"),
        generated_at: doc.get::<DateTime<Utc>>("generated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FirestoreConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC_PATH: &str = "/v1/projects/test-project/databases/(default)/documents/recipe_media/r1";

    fn step_json(idx: u32, url: Option<&str>, status: &str) -> serde_json::Value {
        json!({
            "mapValue": {"fields": {
                "step_index": {"integerValue": idx.to_string()},
                "media_url": match url {
                    Some(u) => json!({"stringValue": u}),
                    None => json!({"nullValue": null}),
                },
                "status": {"stringValue": status},
                "error": {"nullValue": null}
            }}
        })
    }

    fn media_doc(step_images: serde_json::Value) -> serde_json::Value {
        json!({
            "name": "projects/test-project/databases/(default)/documents/recipe_media/r1",
            "fields": {
                "recipe_id": {"stringValue": "r1"},
                "step_images": {"mapValue": {"fields": step_images}},
                "step_videos": {"mapValue": {}},
                "final_video_url": {"nullValue": null}
            },
            "updateTime": "2025-03-01T10:00:00.000001Z"
        })
    }

    async fn repo(server: &MockServer) -> RecipeMediaRepository {
        let client = FirestoreClient::new(FirestoreConfig::emulator("test-project", server.uri()))
            .await
            .unwrap();
        RecipeMediaRepository::new(client)
    }

    #[test]
    fn test_step_field_key_is_zero_padded() {
        assert_eq!(step_field_key(3), "step_03");
        assert_eq!(step_field_key(12), "step_12");
    }

    #[test]
    fn test_document_parses_sorted_steps() {
        let doc: Document = serde_json::from_value(media_doc(json!({
            "step_01": step_json(1, Some("https://cdn/1.png"), "completed"),
            "step_00": step_json(0, Some("https://cdn/0.png"), "completed"),
        })))
        .unwrap();

        let state = document_to_state(&RecipeId::from_string("r1"), &doc);
        assert_eq!(state.step_images.len(), 2);
        assert_eq!(state.step_images[0].step_index, 0);
        assert!(state.has_output(ArtifactKind::StepImages));
        assert!(state.step_videos.is_empty());
    }

    #[tokio::test]
    async fn test_write_step_creates_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/databases/(default)/documents/recipe_media"))
            .and(query_param("documentId", "r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(media_doc(json!({}))))
            .expect(1)
            .mount(&server)
            .await;

        let written = repo(&server)
            .await
            .write_step(
                &RecipeId::from_string("r1"),
                ArtifactKind::StepImages,
                &StepMediaResult::completed(0, "https://cdn/0.png"),
            )
            .await
            .unwrap();
        assert!(written);
    }

    #[tokio::test]
    async fn test_write_step_masks_single_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(media_doc(json!({
                "step_00": step_json(0, Some("https://cdn/0.png"), "completed"),
            }))))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(DOC_PATH))
            .and(query_param("updateMask.fieldPaths", "step_images.step_01"))
            .and(query_param(
                "currentDocument.updateTime",
                "2025-03-01T10:00:00.000001Z",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(media_doc(json!({}))))
            .expect(1)
            .mount(&server)
            .await;

        let written = repo(&server)
            .await
            .write_step(
                &RecipeId::from_string("r1"),
                ArtifactKind::StepImages,
                &StepMediaResult::failed(1, "timed out"),
            )
            .await
            .unwrap();
        assert!(written);
    }

    #[tokio::test]
    async fn test_completed_step_is_not_overwritten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(media_doc(json!({
                "step_00": step_json(0, Some("https://cdn/0.png"), "completed"),
            }))))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let written = repo(&server)
            .await
            .write_step(
                &RecipeId::from_string("r1"),
                ArtifactKind::StepImages,
                &StepMediaResult::failed(0, "late failure"),
            )
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_final_video_requires_completed_step_videos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(media_doc(json!({}))))
            .mount(&server)
            .await;

        let written = repo(&server)
            .await
            .write_final_video(&RecipeId::from_string("r1"), "https://cdn/final.mp4")
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_load_missing_recipe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let state = repo(&server)
            .await
            .load(&RecipeId::from_string("r1"))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}
