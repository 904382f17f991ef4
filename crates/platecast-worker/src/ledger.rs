//! Credit/entitlement ledger.
//!
//! Two tracks per user: consumable photo/video balances for pay-as-you-go
//! users, and a monthly fair-use counter for subscriber videos. A unit is
//! reserved before any provider work and released again unless it ends up
//! completed and persisted, so only delivered units are charged.

use std::sync::Arc;

use platecast_models::{
    ArtifactKind, CreditExhausted, CreditMutation, CreditTrack, Entitlement, PlanTier, UserCredits,
};
use tracing::{info, warn};

use crate::error::WorkerResult;
use crate::metrics::record_credit_denial;
use crate::store::CreditStore;

#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
    fair_use_cap: u32,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn CreditStore>, fair_use_cap: u32) -> Self {
        Self {
            store,
            fair_use_cap,
        }
    }

    /// Track an artifact kind draws from.
    pub fn track_for(kind: ArtifactKind) -> CreditTrack {
        match kind {
            ArtifactKind::StepImages => CreditTrack::Photo,
            ArtifactKind::StepVideos | ArtifactKind::FinalVideo => CreditTrack::Video,
        }
    }

    /// Current record, after the lazy monthly reset.
    pub async fn credits(&self, user_id: &str) -> WorkerResult<UserCredits> {
        let (credits, _) = self.store.apply(user_id, CreditMutation::Touch).await?;
        Ok(credits)
    }

    /// Whether one more unit on `track` is allowed, without taking it.
    ///
    /// The outer `Result` is a storage failure; the inner one is the
    /// entitlement decision.
    pub async fn can_generate(
        &self,
        user_id: &str,
        track: CreditTrack,
    ) -> WorkerResult<Result<Entitlement, CreditExhausted>> {
        let credits = self.credits(user_id).await?;
        let decision = credits.check(track, self.fair_use_cap);

        if let Err(denied) = &decision {
            self.log_denial(user_id, denied);
        }
        Ok(decision)
    }

    /// Check and take one unit on `track` as a single atomic mutation.
    ///
    /// Concurrent generations for the same user can never both pass on the
    /// last credit. A unit that is not delivered must be given back with
    /// [`CreditLedger::release`].
    pub async fn reserve(
        &self,
        user_id: &str,
        track: CreditTrack,
    ) -> WorkerResult<Result<(), CreditExhausted>> {
        let (credits, outcome) = self
            .store
            .apply(
                user_id,
                CreditMutation::Reserve {
                    track,
                    fair_use_cap: self.fair_use_cap,
                },
            )
            .await?;

        if outcome.applied {
            return Ok(Ok(()));
        }

        let denied = match credits.check(track, self.fair_use_cap) {
            Err(denied) => denied,
            Ok(_) => CreditExhausted {
                track,
                remaining: credits.balance(track),
                message: format!("No {track} credits available right now. Try again shortly."),
            },
        };
        self.log_denial(user_id, &denied);
        Ok(Err(denied))
    }

    /// Give back a reserved unit that failed or could not be stored.
    pub async fn release(&self, user_id: &str, track: CreditTrack) -> WorkerResult<UserCredits> {
        let (credits, outcome) = self
            .store
            .apply(user_id, CreditMutation::Release { track })
            .await?;
        if !outcome.applied {
            warn!(user_id = %user_id, track = %track, "Nothing to release");
        }
        Ok(credits)
    }

    /// Top up a consumable balance.
    pub async fn grant(&self, user_id: &str, track: CreditTrack, amount: u32) -> WorkerResult<UserCredits> {
        info!(user_id = %user_id, track = %track, amount, "Granting credits");
        let (credits, _) = self
            .store
            .apply(user_id, CreditMutation::Grant { track, amount })
            .await?;
        Ok(credits)
    }

    pub async fn set_plan(&self, user_id: &str, plan: PlanTier) -> WorkerResult<UserCredits> {
        info!(user_id = %user_id, plan = plan.as_str(), "Setting plan");
        let (credits, _) = self
            .store
            .apply(user_id, CreditMutation::SetPlan { plan })
            .await?;
        Ok(credits)
    }

    fn log_denial(&self, user_id: &str, denied: &CreditExhausted) {
        record_credit_denial(denied.track.as_str());
        info!(
            user_id = %user_id,
            track = %denied.track,
            remaining = denied.remaining,
            "Generation denied: {}", denied.message
        );
    }
}
