//! Quality gate.
//!
//! A coarse size heuristic on provider output. An undersized or unreachable
//! artifact is regenerated exactly once with the alternate prompt, and that
//! second result is accepted whatever it looks like.

use std::future::Future;

use platecast_models::GenerationKind;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::fetch::ArtifactFetcher;
use crate::metrics::record_quality_rejection;
use crate::retry::GenerationOutcome;

/// Which prompt a generation pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Primary,
    Alternate,
}

/// Outcome after the gate, with whether a regeneration happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedOutcome {
    pub outcome: GenerationOutcome,
    pub regenerated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    pub min_video_bytes: u64,
    pub min_image_bytes: u64,
}

impl QualityGate {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            min_video_bytes: config.min_video_bytes,
            min_image_bytes: config.min_image_bytes,
        }
    }

    fn min_bytes(&self, kind: GenerationKind) -> u64 {
        match kind {
            GenerationKind::ImageToVideo => self.min_video_bytes,
            GenerationKind::ImageFromText => self.min_image_bytes,
        }
    }

    /// Metadata-only check of a provider output.
    ///
    /// A missing `Content-Length` passes: only a reported size can be too small.
    pub async fn passes_quality_check(
        &self,
        fetcher: &dyn ArtifactFetcher,
        kind: GenerationKind,
        output_url: &str,
    ) -> bool {
        match fetcher.content_length(output_url).await {
            Ok(Some(size)) if size < self.min_bytes(kind) => {
                debug!(kind = %kind, size, min = self.min_bytes(kind), "Output below size threshold");
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!(kind = %kind, error = %e, "Output unreachable");
                false
            }
        }
    }

    /// Run `generate` and escalate once to the alternate prompt on rejection.
    ///
    /// Outright generation failures are returned as-is; only successful but
    /// rejected output triggers the second pass.
    pub async fn generate_gated<G, Fut>(
        &self,
        fetcher: &dyn ArtifactFetcher,
        kind: GenerationKind,
        generate: G,
    ) -> WorkerResult<GatedOutcome>
    where
        G: Fn(PromptVariant) -> Fut,
        Fut: Future<Output = WorkerResult<GenerationOutcome>>,
    {
        let first = generate(PromptVariant::Primary).await?;

        let url = match &first {
            GenerationOutcome::Succeeded { url, .. } => url,
            GenerationOutcome::Failed { .. } => {
                return Ok(GatedOutcome {
                    outcome: first,
                    regenerated: false,
                })
            }
        };

        if self.passes_quality_check(fetcher, kind, url).await {
            return Ok(GatedOutcome {
                outcome: first,
                regenerated: false,
            });
        }

        record_quality_rejection(kind.as_str());
        warn!(kind = %kind, "Output failed quality check, regenerating with alternate prompt");

        let second = generate(PromptVariant::Alternate).await?;
        Ok(GatedOutcome {
            outcome: second,
            regenerated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use std::sync::Mutex;

    fn gate() -> QualityGate {
        QualityGate {
            min_video_bytes: 500_000,
            min_image_bytes: 10_000,
        }
    }

    fn succeeded(url: &str) -> GenerationOutcome {
        GenerationOutcome::Succeeded {
            url: url.to_string(),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_size_thresholds_per_kind() {
        let fetcher = FakeFetcher::new();
        fetcher.set_length("https://p/small.mp4", 120_000);
        fetcher.set_length("https://p/big.mp4", 900_000);
        fetcher.set_length("https://p/photo.png", 120_000);

        let gate = gate();
        assert!(!gate.passes_quality_check(&fetcher, GenerationKind::ImageToVideo, "https://p/small.mp4").await);
        assert!(gate.passes_quality_check(&fetcher, GenerationKind::ImageToVideo, "https://p/big.mp4").await);
        assert!(gate.passes_quality_check(&fetcher, GenerationKind::ImageFromText, "https://p/photo.png").await);
        assert!(!gate.passes_quality_check(&fetcher, GenerationKind::ImageToVideo, "https://p/missing.mp4").await);
    }

    #[tokio::test]
    async fn test_undersized_output_regenerated_exactly_once() {
        let fetcher = FakeFetcher::new();
        fetcher.set_length("https://p/first.mp4", 1_000);
        fetcher.set_length("https://p/second.mp4", 2_000);

        let variants = Mutex::new(Vec::new());
        let seen = &variants;
        let gated = gate()
            .generate_gated(&fetcher, GenerationKind::ImageToVideo, |variant| async move {
                seen.lock().unwrap().push(variant);
                Ok(match variant {
                    PromptVariant::Primary => succeeded("https://p/first.mp4"),
                    PromptVariant::Alternate => succeeded("https://p/second.mp4"),
                })
            })
            .await
            .unwrap();

        // Second output is also undersized but accepted.
        assert!(gated.regenerated);
        assert_eq!(gated.outcome, succeeded("https://p/second.mp4"));
        assert_eq!(
            *variants.lock().unwrap(),
            vec![PromptVariant::Primary, PromptVariant::Alternate]
        );
    }

    #[tokio::test]
    async fn test_failed_generation_not_regenerated() {
        let fetcher = FakeFetcher::new();
        let gated = gate()
            .generate_gated(&fetcher, GenerationKind::ImageToVideo, |_| async {
                Ok(GenerationOutcome::Failed {
                    reason: "exhausted".into(),
                    attempts: 3,
                })
            })
            .await
            .unwrap();

        assert!(!gated.regenerated);
        assert!(!gated.outcome.is_success());
    }
}
