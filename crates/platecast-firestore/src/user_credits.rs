//! User credits repository.
//!
//! Each user has one document at `user_credits/{user_id}`. Every change goes
//! through [`UserCreditsRepository::apply`], which replays a
//! [`CreditMutation`] against the freshly read record and writes it back with
//! an `updateTime` precondition, so concurrent workers never lose or
//! double-apply a unit.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platecast_models::{CreditMutation, MutationOutcome, PlanTier, UserCredits};
use tracing::{debug, info, warn};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::types::{Document, ToFirestoreValue, Value};

// =============================================================================
// Constants
// =============================================================================

const USER_CREDITS_COLLECTION: &str = "user_credits";

/// Maximum attempts for optimistic-lock updates.
const MAX_CREDIT_RETRIES: u32 = 5;

/// Linear backoff step between attempts (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

// =============================================================================
// User Credits Repository
// =============================================================================

/// Repository for one user's credit record.
pub struct UserCreditsRepository {
    client: FirestoreClient,
    user_id: String,
}

impl UserCreditsRepository {
    /// Create a new user credits repository.
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// Get the user ID this repository operates on.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn read(&self) -> FirestoreResult<Option<Document>> {
        self.client
            .with_retry("get_user_credits", || {
                self.client
                    .get_document(USER_CREDITS_COLLECTION, &self.user_id)
            })
            .await
    }

    /// Current record without writing. Missing users read as zero balances.
    pub async fn get(&self) -> FirestoreResult<UserCredits> {
        match self.read().await? {
            Some(doc) => document_to_credits(&self.user_id, &doc),
            None => Ok(UserCredits::new(&self.user_id, Utc::now())),
        }
    }

    /// Atomically apply a mutation, creating the record on first access.
    ///
    /// The lazy monthly reset is part of every mutation and is persisted with
    /// it. Returns the record as written.
    pub async fn apply(
        &self,
        mutation: CreditMutation,
    ) -> FirestoreResult<(UserCredits, MutationOutcome)> {
        let mut last_error = None;

        for attempt in 0..MAX_CREDIT_RETRIES {
            let doc = self.read().await?;
            let now = Utc::now();

            let (mut credits, update_time) = match &doc {
                Some(d) => (document_to_credits(&self.user_id, d)?, d.update_time.clone()),
                None => (UserCredits::new(&self.user_id, now), None),
            };

            let outcome = credits.apply(mutation, now);
            let fields = credits_to_fields(&credits);

            if update_time.is_none() {
                match self
                    .client
                    .create_document(USER_CREDITS_COLLECTION, &self.user_id, fields)
                    .await
                {
                    Ok(_) => {
                        info!(user_id = %self.user_id, "Created user credits record");
                        return Ok((credits, outcome));
                    }
                    Err(FirestoreError::AlreadyExists(_)) => {
                        debug!(user_id = %self.user_id, "User credits created concurrently, re-reading");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if !outcome.changed {
                return Ok((credits, outcome));
            }

            let update_mask: Vec<String> = fields.keys().cloned().collect();
            match self
                .client
                .update_document_with_precondition(
                    USER_CREDITS_COLLECTION,
                    &self.user_id,
                    fields,
                    Some(update_mask),
                    update_time.as_deref(),
                )
                .await
            {
                Ok(_) => {
                    info!(
                        user_id = %self.user_id,
                        mutation = ?mutation,
                        photo_credits = credits.photo_credits,
                        video_credits = credits.video_credits,
                        videos_this_month = credits.videos_generated_this_month,
                        month_reset = outcome.month_reset,
                        "Applied credit mutation"
                    );
                    return Ok((credits, outcome));
                }
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        user_id = %self.user_id,
                        attempt = attempt + 1,
                        "Credit update precondition failed, retrying"
                    );
                    record_precondition_conflict(USER_CREDITS_COLLECTION);
                    last_error = Some(e);
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(user_id = %self.user_id, error = %e, "Failed to update credits");
                    return Err(e);
                }
            }
        }

        warn!(
            user_id = %self.user_id,
            retries = MAX_CREDIT_RETRIES,
            error = ?last_error,
            "Credit update failed after retries"
        );
        Err(FirestoreError::request_failed(
            "Failed to update credits due to concurrent updates",
        ))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn credits_to_fields(credits: &UserCredits) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), credits.user_id.to_firestore_value());
    fields.insert("plan".to_string(), credits.plan.as_str().to_firestore_value());
    fields.insert(
        "photo_credits".to_string(),
        credits.photo_credits.to_firestore_value(),
    );
    fields.insert(
        "video_credits".to_string(),
        credits.video_credits.to_firestore_value(),
    );
    fields.insert(
        "videos_generated_this_month".to_string(),
        credits.videos_generated_this_month.to_firestore_value(),
    );
    fields.insert(
        "month_reset_at".to_string(),
        credits.month_reset_at.to_firestore_value(),
    );
    fields.insert("updated_at".to_string(), credits.updated_at.to_firestore_value());
    fields
}

fn document_to_credits(user_id: &str, doc: &Document) -> FirestoreResult<UserCredits> {
    let month_reset_at: DateTime<Utc> = doc.get("month_reset_at").ok_or_else(|| {
        FirestoreError::invalid_response(format!("user_credits/{} has no month_reset_at", user_id))
    })?;

    Ok(UserCredits {
        user_id: user_id.to_string(),
        plan: doc
            .get::<String>("plan")
            .map(|p| PlanTier::from_str(&p))
            .unwrap_or_default(),
        photo_credits: doc.get("photo_credits").unwrap_or(0),
        video_credits: doc.get("video_credits").unwrap_or(0),
        videos_generated_this_month: doc.get("videos_generated_this_month").unwrap_or(0),
        month_reset_at,
        updated_at: doc.get("updated_at").unwrap_or(month_reset_at),
    })
}

// =============================================================================
// Tests
// =============================================================================
