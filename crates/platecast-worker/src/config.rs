//! Worker configuration.

use std::time::Duration;

use platecast_models::{AspectRatio, DEFAULT_FAIR_USE_MONTHLY_CAP};

use crate::retry::RetryPolicy;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Retries after the first attempt of a generation unit
    pub max_retries: u32,
    /// Interval between task polls
    pub poll_interval: Duration,
    /// Base backoff between attempts (doubles each attempt)
    pub backoff_base: Duration,
    /// Upper bound for one submit-and-poll attempt
    pub attempt_timeout: Duration,
    /// Smallest acceptable video, in bytes
    pub min_video_bytes: u64,
    /// Smallest acceptable image, in bytes
    pub min_image_bytes: u64,
    /// Subscriber videos per calendar month
    pub fair_use_monthly_cap: u32,
    /// Length of each step clip
    pub step_video_duration_secs: u32,
    /// Length of the composite video
    pub final_video_duration_secs: u32,
    pub aspect_ratio: AspectRatio,
    /// Prometheus exporter port; exporter is disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            poll_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(180), // 3 minutes
            min_video_bytes: 500_000,
            min_image_bytes: 10_000,
            fair_use_monthly_cap: DEFAULT_FAIR_USE_MONTHLY_CAP,
            step_video_duration_secs: 5,
            final_video_duration_secs: 10,
            aspect_ratio: AspectRatio::Portrait,
            metrics_port: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse("GENERATION_MAX_RETRIES").unwrap_or(defaults.max_retries),
            poll_interval: env_parse("GENERATION_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            backoff_base: env_parse("GENERATION_BACKOFF_BASE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.backoff_base),
            attempt_timeout: env_parse("GENERATION_ATTEMPT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_timeout),
            min_video_bytes: env_parse("QUALITY_MIN_VIDEO_BYTES")
                .unwrap_or(defaults.min_video_bytes),
            min_image_bytes: env_parse("QUALITY_MIN_IMAGE_BYTES")
                .unwrap_or(defaults.min_image_bytes),
            fair_use_monthly_cap: env_parse("FAIR_USE_MONTHLY_CAP")
                .unwrap_or(defaults.fair_use_monthly_cap),
            step_video_duration_secs: env_parse("STEP_VIDEO_DURATION_SECS")
                .unwrap_or(defaults.step_video_duration_secs),
            final_video_duration_secs: env_parse("FINAL_VIDEO_DURATION_SECS")
                .unwrap_or(defaults.final_video_duration_secs),
            aspect_ratio: defaults.aspect_ratio,
            metrics_port: env_parse("METRICS_PORT"),
        }
    }

    /// Retry policy for one generation unit.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            poll_interval: self.poll_interval,
            backoff_base: self.backoff_base,
            attempt_timeout: self.attempt_timeout,
        }
    }
}
