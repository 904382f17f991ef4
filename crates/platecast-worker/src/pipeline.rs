//! Generation pipelines for step images, step videos and the final video.
//!
//! Per unit: credit reservation → generation with retry (plus the quality
//! gate for the final video) → one download of the provider output → object
//! storage → write-through. A reserved credit is released again unless the
//! permanent URL is persisted.

use std::sync::Arc;

use async_trait::async_trait;
use platecast_models::{
    ArtifactKind, BatchSummary, CreditExhausted, CreditTrack, RecipeId, RecipeInput,
    RecipeMediaRecord, RecipeMediaState, Step, StepMediaResult,
};
use platecast_provider::{GenerationProvider, SubmitRequest};
use platecast_storage::{final_video_key, step_media_key, ObjectStore};
use tracing::{error, info, warn};

use crate::batch::{BatchReport, BatchSequencer, StepGenerator, StepOutcome};
use crate::cache::{CachedMedia, MediaCache};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fetch::ArtifactFetcher;
use crate::ledger::CreditLedger;
use crate::logging::GenerationLogger;
use crate::metrics::{record_cache_hit, record_unit};
use crate::prompt::{
    build_alternate_prompt, build_prompt, build_step_prompt, PromptContext,
};
use crate::quality::{PromptVariant, QualityGate};
use crate::retry::{run_with_retry, submit_and_wait, GenerationOutcome};
use crate::store::{CreditStore, MediaStore};

/// Result of a final video request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalVideoOutcome {
    Ready { url: String, cached: bool },
    /// Step videos are still missing; nothing was generated or charged
    NotReady { completed: usize, total: usize },
    Failed { reason: String },
    Denied(CreditExhausted),
}

/// One unit of generation work.
struct UnitSpec<'a> {
    user_id: &'a str,
    recipe_id: &'a RecipeId,
    kind: ArtifactKind,
    step_index: Option<u32>,
    request: SubmitRequest,
    /// Set for flows behind the quality gate
    alternate_prompt: Option<String>,
    logger: &'a GenerationLogger,
}

pub struct GenerationPipeline {
    config: WorkerConfig,
    provider: Arc<dyn GenerationProvider>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn ArtifactFetcher>,
    cache: MediaCache,
    ledger: CreditLedger,
    gate: QualityGate,
}

impl GenerationPipeline {
    pub fn new(
        config: WorkerConfig,
        provider: Arc<dyn GenerationProvider>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ArtifactFetcher>,
        media_store: Arc<dyn MediaStore>,
        credit_store: Arc<dyn CreditStore>,
    ) -> Self {
        let gate = QualityGate::from_config(&config);
        let ledger = CreditLedger::new(credit_store, config.fair_use_monthly_cap);
        Self {
            config,
            provider,
            objects,
            fetcher,
            cache: MediaCache::new(media_store),
            ledger,
            gate,
        }
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    /// One still image per step.
    pub async fn generate_step_images<P>(
        &self,
        user_id: &str,
        recipe: &RecipeInput,
        on_progress: P,
    ) -> WorkerResult<BatchReport>
    where
        P: FnMut(&[StepMediaResult]) + Send,
    {
        self.run_batch(ArtifactKind::StepImages, user_id, recipe, on_progress)
            .await
    }

    /// One short clip per step, animated from that step's image.
    pub async fn generate_step_videos<P>(
        &self,
        user_id: &str,
        recipe: &RecipeInput,
        on_progress: P,
    ) -> WorkerResult<BatchReport>
    where
        P: FnMut(&[StepMediaResult]) + Send,
    {
        self.run_batch(ArtifactKind::StepVideos, user_id, recipe, on_progress)
            .await
    }

    /// Composite video for the whole recipe. Requires every step video.
    pub async fn generate_final_video(
        &self,
        user_id: &str,
        recipe: &RecipeInput,
    ) -> WorkerResult<FinalVideoOutcome> {
        self.config.retry_policy().validate()?;
        let recipe_id = &recipe.recipe_id;
        let logger = GenerationLogger::new(recipe_id, ArtifactKind::FinalVideo.as_str());

        if let Some(CachedMedia::FinalVideo(url)) = self
            .cache
            .get_cached(recipe_id, ArtifactKind::FinalVideo)
            .await?
        {
            record_cache_hit(ArtifactKind::FinalVideo.as_str());
            info!(recipe_id = %recipe_id, "Final video served from cache");
            return Ok(FinalVideoOutcome::Ready { url, cached: true });
        }

        let state = self
            .cache
            .load(recipe_id)
            .await?
            .unwrap_or_else(|| RecipeMediaState::new(recipe_id.clone()));

        let total = recipe.steps.len();
        if !state.all_completed(ArtifactKind::StepVideos, total) {
            let completed = state
                .step_videos
                .iter()
                .filter(|r| r.is_completed())
                .count();
            info!(
                recipe_id = %recipe_id,
                completed,
                total,
                "Final video not ready, step videos incomplete"
            );
            return Ok(FinalVideoOutcome::NotReady { completed, total });
        }

        let source = recipe
            .source_image_url
            .clone()
            .or_else(|| {
                state
                    .step_images
                    .iter()
                    .rev()
                    .find_map(|r| r.media_url.clone())
            })
            .ok_or_else(|| WorkerError::validation("final video needs a source image"))?;

        let ctx = PromptContext::from_recipe(recipe, self.config.aspect_ratio);
        let request = SubmitRequest::video(
            build_prompt(&ctx),
            source,
            self.config.final_video_duration_secs,
        )
        .with_aspect_ratio(self.config.aspect_ratio);

        logger.log_start("final video");
        let outcome = self
            .produce_unit(UnitSpec {
                user_id,
                recipe_id,
                kind: ArtifactKind::FinalVideo,
                step_index: None,
                request,
                alternate_prompt: Some(build_alternate_prompt(&ctx)),
                logger: &logger,
            })
            .await;

        Ok(match outcome {
            StepOutcome::Completed(url) => {
                logger.log_completion("final video stored");
                FinalVideoOutcome::Ready { url, cached: false }
            }
            StepOutcome::Failed(reason) => FinalVideoOutcome::Failed { reason },
            StepOutcome::Denied(denied) => FinalVideoOutcome::Denied(denied),
        })
    }

    /// Persisted record shape for callers.
    pub async fn record(&self, recipe_id: &RecipeId) -> WorkerResult<RecipeMediaRecord> {
        Ok(self
            .cache
            .load(recipe_id)
            .await?
            .unwrap_or_else(|| RecipeMediaState::new(recipe_id.clone()))
            .to_record())
    }

    async fn run_batch<P>(
        &self,
        kind: ArtifactKind,
        user_id: &str,
        recipe: &RecipeInput,
        mut on_progress: P,
    ) -> WorkerResult<BatchReport>
    where
        P: FnMut(&[StepMediaResult]) + Send,
    {
        self.config.retry_policy().validate()?;
        let recipe_id = &recipe.recipe_id;
        let logger = GenerationLogger::new(recipe_id, kind.as_str());

        if let Some(CachedMedia::Steps(results)) = self.cache.get_cached(recipe_id, kind).await? {
            if results.len() == recipe.steps.len() {
                record_cache_hit(kind.as_str());
                on_progress(&results);
                logger.log_completion("served from cache");
                return Ok(BatchReport {
                    summary: BatchSummary::from_results(kind, &results),
                    results,
                    denied: None,
                });
            }
        }

        let state = self
            .cache
            .load(recipe_id)
            .await?
            .unwrap_or_else(|| RecipeMediaState::new(recipe_id.clone()));

        let generator = StepUnitGenerator {
            pipeline: self,
            user_id,
            recipe,
            kind,
            ctx: PromptContext::from_recipe(recipe, self.config.aspect_ratio),
            step_images: state.step_images.clone(),
            logger: &logger,
        };

        let report = BatchSequencer::new(kind, logger.clone())
            .generate_batch(&generator, &recipe.steps, state.steps(kind), on_progress)
            .await;

        logger.log_completion(&report.summary.message());
        Ok(report)
    }

    // =========================================================================
    // Units
    // =========================================================================

    async fn produce_unit(&self, unit: UnitSpec<'_>) -> StepOutcome {
        let track = CreditLedger::track_for(unit.kind);
        match self.ledger.reserve(unit.user_id, track).await {
            Ok(Ok(())) => {}
            Ok(Err(denied)) => return StepOutcome::Denied(denied),
            Err(e) => {
                unit.logger
                    .log_warning(unit.step_index, &format!("credit check failed: {}", e));
                return StepOutcome::Failed(format!("Could not check credits: {}", e));
            }
        }

        let provider_url = match self.generate(&unit).await {
            GenerationOutcome::Succeeded { url, .. } => url,
            GenerationOutcome::Failed { reason, .. } => {
                record_unit(unit.kind.as_str(), "failed");
                self.release_credit(&unit, track).await;
                self.persist_failure(&unit, &reason).await;
                return StepOutcome::Failed(reason);
            }
        };

        match self.store_artifact(&unit, &provider_url).await {
            Ok(permanent_url) => {
                record_unit(unit.kind.as_str(), "completed");
                StepOutcome::Completed(permanent_url)
            }
            Err(e) => {
                record_unit(unit.kind.as_str(), "lost");
                unit.logger
                    .log_persistence_failure(unit.step_index, &provider_url, &e.to_string());
                self.release_credit(&unit, track).await;
                StepOutcome::Failed(format!("Generated media could not be saved: {}", e))
            }
        }
    }

    /// Generation with retries. Units with an alternate prompt also go
    /// through the quality gate.
    async fn generate(&self, unit: &UnitSpec<'_>) -> GenerationOutcome {
        let policy = self.config.retry_policy();
        let policy = &policy;
        let provider = self.provider.as_ref();
        let operation = unit.kind.as_str();

        let result = match unit.alternate_prompt.as_deref() {
            None => {
                run_with_retry(policy, operation, |attempt| {
                    submit_and_wait(provider, &unit.request, attempt, policy.poll_interval)
                })
                .await
            }
            Some(alternate_prompt) => self
                .gate
                .generate_gated(self.fetcher.as_ref(), unit.request.kind, |variant| {
                    let request = match variant {
                        PromptVariant::Primary => unit.request.clone(),
                        PromptVariant::Alternate => unit.request.with_prompt(alternate_prompt),
                    };
                    async move {
                        run_with_retry(policy, operation, |attempt| {
                            submit_and_wait(provider, &request, attempt, policy.poll_interval)
                        })
                        .await
                    }
                })
                .await
                .map(|gated| gated.outcome),
        };

        // The policy is validated on entry to every pipeline.
        result.unwrap_or_else(|e| GenerationOutcome::Failed {
            reason: e.to_string(),
            attempts: 0,
        })
    }

    async fn release_credit(&self, unit: &UnitSpec<'_>, track: CreditTrack) {
        if let Err(e) = self.ledger.release(unit.user_id, track).await {
            error!(
                user_id = %unit.user_id,
                recipe_id = %unit.recipe_id,
                track = %track,
                error = %e,
                "Failed to release reserved credit"
            );
        }
    }

    /// Copy the provider output into object storage and write it through.
    async fn store_artifact(&self, unit: &UnitSpec<'_>, provider_url: &str) -> WorkerResult<String> {
        let bytes = self.fetcher.download(provider_url).await?;

        let key = match unit.step_index {
            Some(index) => step_media_key(unit.recipe_id, unit.kind, index),
            None => final_video_key(unit.recipe_id),
        };
        let permanent_url = self
            .objects
            .put(&key, bytes, unit.request.kind.content_type())
            .await?;

        let written = match unit.step_index {
            Some(index) => {
                self.cache
                    .write_through(
                        unit.recipe_id,
                        unit.kind,
                        &StepMediaResult::completed(index, permanent_url.clone()),
                    )
                    .await?
            }
            None => self.cache.write_final_video(unit.recipe_id, &permanent_url).await?,
        };

        if !written {
            return Err(WorkerError::persistence(format!(
                "{} for recipe {} was not accepted by the media record",
                unit.kind, unit.recipe_id
            )));
        }
        Ok(permanent_url)
    }

    async fn persist_failure(&self, unit: &UnitSpec<'_>, reason: &str) {
        let Some(index) = unit.step_index else {
            return;
        };
        if let Err(e) = self
            .cache
            .write_through(unit.recipe_id, unit.kind, &StepMediaResult::failed(index, reason))
            .await
        {
            warn!(
                recipe_id = %unit.recipe_id,
                step_index = index,
                error = %e,
                "Failed to record step failure"
            );
        }
    }
}

// =============================================================================
// Step Generator
// =============================================================================

struct StepUnitGenerator<'a> {
    pipeline: &'a GenerationPipeline,
    user_id: &'a str,
    recipe: &'a RecipeInput,
    kind: ArtifactKind,
    ctx: PromptContext<'a>,
    /// Step images at batch start; sources for step videos
    step_images: Vec<StepMediaResult>,
    logger: &'a GenerationLogger,
}

impl StepUnitGenerator<'_> {
    fn video_source(&self, step_index: u32) -> Option<String> {
        self.step_images
            .iter()
            .find(|r| r.step_index == step_index && r.is_completed())
            .and_then(|r| r.media_url.clone())
            .or_else(|| self.recipe.source_image_url.clone())
    }
}

#[async_trait]
impl<'a> StepGenerator for StepUnitGenerator<'a> {
    async fn generate_step(&self, step_index: u32, step: &Step) -> StepOutcome {
        let position = step_index as usize;
        let prompt = build_step_prompt(&self.ctx, position, &step.instruction);
        let config = &self.pipeline.config;

        let request = match self.kind {
            ArtifactKind::StepVideos => {
                let Some(source) = self.video_source(step_index) else {
                    return StepOutcome::Failed(format!(
                        "No source image for step {}",
                        step_index + 1
                    ));
                };
                SubmitRequest::video(prompt, source, config.step_video_duration_secs)
            }
            _ => SubmitRequest::image(prompt),
        }
        .with_aspect_ratio(config.aspect_ratio);

        self.pipeline
            .produce_unit(UnitSpec {
                user_id: self.user_id,
                recipe_id: &self.recipe.recipe_id,
                kind: self.kind,
                step_index: Some(step_index),
                request,
                alternate_prompt: None,
                logger: self.logger,
            })
            .await
    }
}
