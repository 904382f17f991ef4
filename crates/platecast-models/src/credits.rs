//! User credit balances and entitlement checks.
//!
//! Two tracks are metered per user:
//! - consumable balances (`photo_credits`, `video_credits`) for pay-as-you-go
//!   users, decremented once per persisted unit
//! - a monthly fair-use counter for subscriber videos, reset lazily on the
//!   first access in a new calendar month (UTC)
//!
//! All mutation goes through [`UserCredits::apply`] so that storage backends
//! can replay it inside their own atomic read-modify-write loop.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default monthly fair-use cap for subscriber videos.
pub const DEFAULT_FAIR_USE_MONTHLY_CAP: u32 = 50;

/// Billing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    PayAsYouGo,
    Unlimited,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::PayAsYouGo => "pay_as_you_go",
            PlanTier::Unlimited => "unlimited",
        }
    }

    /// Parse a stored plan string, falling back to pay-as-you-go.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "unlimited" | "subscriber" | "pro" => PlanTier::Unlimited,
            _ => PlanTier::PayAsYouGo,
        }
    }

    pub fn is_subscriber(&self) -> bool {
        matches!(self, PlanTier::Unlimited)
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which balance a unit of generation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTrack {
    Photo,
    Video,
}

impl CreditTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditTrack::Photo => "photo",
            CreditTrack::Video => "video",
        }
    }
}

impl fmt::Display for CreditTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an allowed unit will be metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Entitlement {
    /// Subscriber photos are not metered
    Unmetered,
    /// Draws from a consumable balance
    Consumable { remaining: u32 },
    /// Counts against the monthly fair-use cap
    FairUse { used: u32, cap: u32 },
}

/// Denial returned when a user cannot generate on a track.
///
/// This is a value, not an error: callers surface it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditExhausted {
    pub track: CreditTrack,
    pub remaining: u32,
    pub message: String,
}

impl fmt::Display for CreditExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CreditExhausted {}

/// A single atomic change to a user's credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum CreditMutation {
    /// Meter one successful, persisted unit
    Consume { track: CreditTrack },
    /// Check and meter one unit in a single step, before generation
    Reserve { track: CreditTrack, fair_use_cap: u32 },
    /// Return a reserved unit that was never delivered
    Release { track: CreditTrack },
    /// Top up a consumable balance
    Grant { track: CreditTrack, amount: u32 },
    /// Change the billing plan
    SetPlan { plan: PlanTier },
    /// Only apply the lazy monthly reset
    Touch,
}

/// Result of applying a [`CreditMutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationOutcome {
    /// The fair-use counter was reset during this mutation
    pub month_reset: bool,
    /// Whether the stored record needs writing
    pub changed: bool,
    /// Whether the mutation was allowed. `false` for a denied reservation or
    /// a consume/release with nothing to take or return.
    pub applied: bool,
}

/// Per-user credit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredits {
    pub user_id: String,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub photo_credits: u32,
    #[serde(default)]
    pub video_credits: u32,
    #[serde(default)]
    pub videos_generated_this_month: u32,
    pub month_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserCredits {
    /// Zero-balance record created on first access.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            plan: PlanTier::default(),
            photo_credits: 0,
            video_credits: 0,
            videos_generated_this_month: 0,
            month_reset_at: now,
            updated_at: now,
        }
    }

    /// Reset the fair-use counter if `month_reset_at` is in an earlier
    /// calendar month than `now`. Returns whether a reset happened.
    ///
    /// Calling this again within the same month is a no-op.
    pub fn roll_month(&mut self, now: DateTime<Utc>) -> bool {
        let last = (self.month_reset_at.year(), self.month_reset_at.month());
        let current = (now.year(), now.month());

        if last < current {
            self.videos_generated_this_month = 0;
            self.month_reset_at = now;
            true
        } else {
            false
        }
    }

    /// Balance for a consumable track.
    pub fn balance(&self, track: CreditTrack) -> u32 {
        match track {
            CreditTrack::Photo => self.photo_credits,
            CreditTrack::Video => self.video_credits,
        }
    }

    /// Check whether one more unit on `track` is allowed.
    ///
    /// Callers are expected to have applied [`UserCredits::roll_month`] first.
    pub fn check(&self, track: CreditTrack, fair_use_cap: u32) -> Result<Entitlement, CreditExhausted> {
        match (self.plan, track) {
            (PlanTier::Unlimited, CreditTrack::Photo) => Ok(Entitlement::Unmetered),
            (PlanTier::Unlimited, CreditTrack::Video) => {
                let used = self.videos_generated_this_month;
                if used < fair_use_cap {
                    Ok(Entitlement::FairUse {
                        used,
                        cap: fair_use_cap,
                    })
                } else {
                    Err(CreditExhausted {
                        track,
                        remaining: 0,
                        message: format!(
                            "Monthly video limit reached ({used} of {fair_use_cap}). Resets next month."
                        ),
                    })
                }
            }
            (PlanTier::PayAsYouGo, _) => {
                let remaining = self.balance(track);
                if remaining > 0 {
                    Ok(Entitlement::Consumable { remaining })
                } else {
                    Err(CreditExhausted {
                        track,
                        remaining: 0,
                        message: format!("No {track} credits remaining. Top up to keep generating."),
                    })
                }
            }
        }
    }

    /// Meter one unit. Balances saturate at zero.
    fn consume(&mut self, track: CreditTrack) -> bool {
        match (self.plan, track) {
            (PlanTier::Unlimited, CreditTrack::Photo) => false,
            (PlanTier::Unlimited, CreditTrack::Video) => {
                self.videos_generated_this_month = self.videos_generated_this_month.saturating_add(1);
                true
            }
            (PlanTier::PayAsYouGo, CreditTrack::Photo) if self.photo_credits > 0 => {
                self.photo_credits -= 1;
                true
            }
            (PlanTier::PayAsYouGo, CreditTrack::Video) if self.video_credits > 0 => {
                self.video_credits -= 1;
                true
            }
            (PlanTier::PayAsYouGo, _) => false,
        }
    }

    /// Undo one [`UserCredits::consume`].
    fn release(&mut self, track: CreditTrack) -> bool {
        match (self.plan, track) {
            (PlanTier::Unlimited, CreditTrack::Photo) => false,
            (PlanTier::Unlimited, CreditTrack::Video) if self.videos_generated_this_month > 0 => {
                self.videos_generated_this_month -= 1;
                true
            }
            (PlanTier::Unlimited, CreditTrack::Video) => false,
            (PlanTier::PayAsYouGo, CreditTrack::Photo) => {
                self.photo_credits = self.photo_credits.saturating_add(1);
                true
            }
            (PlanTier::PayAsYouGo, CreditTrack::Video) => {
                self.video_credits = self.video_credits.saturating_add(1);
                true
            }
        }
    }

    /// Apply a mutation after the lazy monthly reset.
    pub fn apply(&mut self, mutation: CreditMutation, now: DateTime<Utc>) -> MutationOutcome {
        let month_reset = self.roll_month(now);

        let (mutated, applied) = match mutation {
            CreditMutation::Consume { track } => {
                let consumed = self.consume(track);
                (consumed, consumed)
            }
            CreditMutation::Reserve { track, fair_use_cap } => {
                match self.check(track, fair_use_cap) {
                    Ok(_) => (self.consume(track), true),
                    Err(_) => (false, false),
                }
            }
            CreditMutation::Release { track } => {
                let released = self.release(track);
                (released, released)
            }
            CreditMutation::Grant { track, amount } => {
                match track {
                    CreditTrack::Photo => {
                        self.photo_credits = self.photo_credits.saturating_add(amount)
                    }
                    CreditTrack::Video => {
                        self.video_credits = self.video_credits.saturating_add(amount)
                    }
                }
                (amount > 0, true)
            }
            CreditMutation::SetPlan { plan } => {
                let changed = self.plan != plan;
                self.plan = plan;
                (changed, true)
            }
            CreditMutation::Touch => (false, true),
        };

        let changed = mutated || month_reset;
        if changed {
            self.updated_at = now;
        }

        MutationOutcome {
            month_reset,
            changed,
            applied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_consumable_decrements_and_saturates() {
        let now = at(2025, 3, 1);
        let mut credits = UserCredits::new("u1", now);
        credits.apply(
            CreditMutation::Grant {
                track: CreditTrack::Photo,
                amount: 2,
            },
            now,
        );

        for _ in 0..4 {
            credits.apply(
                CreditMutation::Consume {
                    track: CreditTrack::Photo,
                },
                now,
            );
        }
        assert_eq!(credits.photo_credits, 0);

        let denied = credits.check(CreditTrack::Photo, DEFAULT_FAIR_USE_MONTHLY_CAP);
        let denied = denied.unwrap_err();
        assert_eq!(denied.track, CreditTrack::Photo);
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn test_monthly_reset_is_idempotent() {
        let mut credits = UserCredits::new("u1", at(2025, 1, 20));
        credits.plan = PlanTier::Unlimited;
        credits.videos_generated_this_month = 50;

        let feb = at(2025, 2, 3);
        assert!(credits.roll_month(feb));
        assert_eq!(credits.videos_generated_this_month, 0);
        assert_eq!(credits.month_reset_at, feb);

        credits.apply(
            CreditMutation::Consume {
                track: CreditTrack::Video,
            },
            feb,
        );
        assert!(!credits.roll_month(at(2025, 2, 27)));
        assert!(!credits.roll_month(at(2025, 2, 28)));
        assert_eq!(credits.videos_generated_this_month, 1);
    }

    #[test]
    fn test_month_rollover_across_year() {
        let mut credits = UserCredits::new("u1", at(2024, 12, 31));
        credits.videos_generated_this_month = 9;
        assert!(credits.roll_month(at(2025, 1, 1)));
        assert_eq!(credits.videos_generated_this_month, 0);
    }

    #[test]
    fn test_subscriber_tracks() {
        let now = at(2025, 5, 10);
        let mut credits = UserCredits::new("u1", now);
        credits.apply(
            CreditMutation::SetPlan {
                plan: PlanTier::Unlimited,
            },
            now,
        );

        assert_eq!(
            credits.check(CreditTrack::Photo, 50),
            Ok(Entitlement::Unmetered)
        );
        let outcome = credits.apply(
            CreditMutation::Consume {
                track: CreditTrack::Photo,
            },
            now,
        );
        assert!(!outcome.changed);

        credits.videos_generated_this_month = 2;
        assert!(credits.check(CreditTrack::Video, 2).is_err());
        assert_eq!(
            credits.check(CreditTrack::Video, 3),
            Ok(Entitlement::FairUse { used: 2, cap: 3 })
        );
    }

    #[test]
    fn test_reserve_is_denied_at_zero_balance() {
        let now = at(2025, 6, 2);
        let mut credits = UserCredits::new("u1", now);
        credits.photo_credits = 1;
        let reserve = CreditMutation::Reserve {
            track: CreditTrack::Photo,
            fair_use_cap: 50,
        };

        let first = credits.apply(reserve, now);
        assert!(first.applied);
        assert_eq!(credits.photo_credits, 0);

        let second = credits.apply(reserve, now);
        assert!(!second.applied);
        assert!(!second.changed);
        assert_eq!(credits.photo_credits, 0);
    }

    #[test]
    fn test_release_returns_reserved_unit() {
        let now = at(2025, 6, 2);
        let mut credits = UserCredits::new("u1", now);
        credits.video_credits = 2;

        credits.apply(
            CreditMutation::Reserve {
                track: CreditTrack::Video,
                fair_use_cap: 50,
            },
            now,
        );
        assert_eq!(credits.video_credits, 1);
        credits.apply(CreditMutation::Release { track: CreditTrack::Video }, now);
        assert_eq!(credits.video_credits, 2);

        credits.plan = PlanTier::Unlimited;
        credits.apply(
            CreditMutation::Reserve {
                track: CreditTrack::Video,
                fair_use_cap: 1,
            },
            now,
        );
        assert_eq!(credits.videos_generated_this_month, 1);
        let denied = credits.apply(
            CreditMutation::Reserve {
                track: CreditTrack::Video,
                fair_use_cap: 1,
            },
            now,
        );
        assert!(!denied.applied);

        credits.apply(CreditMutation::Release { track: CreditTrack::Video }, now);
        assert_eq!(credits.videos_generated_this_month, 0);
        let outcome = credits.apply(CreditMutation::Release { track: CreditTrack::Video }, now);
        assert!(!outcome.applied);
        assert_eq!(credits.videos_generated_this_month, 0);
    }

    #[test]
    fn test_plan_from_str() {
        assert_eq!(PlanTier::from_str("unlimited"), PlanTier::Unlimited);
        assert_eq!(PlanTier::from_str("anything"), PlanTier::PayAsYouGo);
    }
}
