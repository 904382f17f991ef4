//! Retry/backoff controller for generation units.
//!
//! One unit is up to `max_retries + 1` submit-and-poll attempts. Each attempt
//! is bounded by `attempt_timeout`; between attempts the controller sleeps
//! `backoff_base * 2^attempt`. Provider failures never escape as errors: the
//! caller gets a [`GenerationOutcome`].

use std::future::Future;
use std::time::Duration;

use platecast_models::{GenerationTask, TaskStatus};
use platecast_provider::{GenerationProvider, SubmitRequest};
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::record_attempt;

/// Retry policy for one generation unit.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub poll_interval: Duration,
    /// Backoff before retry `n` is `backoff_base * 2^(n-1)`
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            poll_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(180),
        }
    }
}

impl RetryPolicy {
    /// Reject settings that would spin or never time out.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.poll_interval.is_zero() {
            return Err(WorkerError::config_error("poll interval must be positive"));
        }
        if self.attempt_timeout.is_zero() {
            return Err(WorkerError::config_error("attempt timeout must be positive"));
        }
        Ok(())
    }

    /// Sleep before attempt `attempt + 1` (0-based `attempt` just failed).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Tagged result of a generation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Succeeded { url: String, attempts: u32 },
    Failed { reason: String, attempts: u32 },
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            GenerationOutcome::Succeeded { attempts, .. }
            | GenerationOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Drive `attempt_fn` until it yields an output URL or attempts run out.
///
/// `attempt_fn` receives the 1-based attempt number. Only an invalid policy
/// is returned as `Err`.
pub async fn run_with_retry<F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    attempt_fn: F,
) -> WorkerResult<GenerationOutcome>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = WorkerResult<String>>,
{
    policy.validate()?;

    let max_attempts = policy.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        let number = attempt + 1;

        let result = match tokio::time::timeout(policy.attempt_timeout, attempt_fn(number)).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::timeout(format!(
                "attempt {} exceeded {}s",
                number,
                policy.attempt_timeout.as_secs()
            ))),
        };

        match result {
            Ok(url) => {
                record_attempt(operation, "succeeded");
                info!(operation = %operation, attempt = number, "Generation succeeded");
                return Ok(GenerationOutcome::Succeeded {
                    url,
                    attempts: number,
                });
            }
            Err(e) if !e.is_retryable() => {
                record_attempt(operation, "rejected");
                warn!(operation = %operation, attempt = number, error = %e, "Generation rejected, not retrying");
                return Ok(GenerationOutcome::Failed {
                    reason: e.to_string(),
                    attempts: number,
                });
            }
            Err(e) => {
                record_attempt(operation, "failed");
                last_error = e.to_string();

                if number < max_attempts {
                    let delay = policy.backoff_for(attempt);
                    warn!(
                        operation = %operation,
                        attempt = number,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Generation attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(operation = %operation, attempt = number, error = %e, "Generation attempts exhausted");
                }
            }
        }
    }

    Ok(GenerationOutcome::Failed {
        reason: last_error,
        attempts: max_attempts,
    })
}

/// One attempt: submit, then poll until the task is terminal.
///
/// Dropping this future does not cancel the remote task.
pub async fn submit_and_wait(
    provider: &dyn GenerationProvider,
    request: &SubmitRequest,
    attempt: u32,
    poll_interval: Duration,
) -> WorkerResult<String> {
    let task_id = provider.submit(request).await?;
    let mut task = GenerationTask::submitted(task_id, request.kind, attempt);

    loop {
        tokio::time::sleep(poll_interval).await;

        let poll = provider.poll(&task.id).await?;
        task.record_status(poll.status);
        debug!(task_id = %task.id, attempt, status = %task.status, "Task status");

        match task.status {
            TaskStatus::Succeeded => {
                return poll.output_url.ok_or_else(|| {
                    WorkerError::task_failed(task.id.as_str(), "succeeded without output")
                });
            }
            TaskStatus::Failed | TaskStatus::Cancelled => {
                let reason = poll
                    .failure_reason
                    .unwrap_or_else(|| format!("task {}", task.status));
                task.fail(reason.clone());
                return Err(WorkerError::task_failed(task.id.as_str(), reason));
            }
            TaskStatus::Pending | TaskStatus::Running => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use platecast_provider::{ProviderError, TaskPoll};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_unit_makes_three_attempts_with_backoff() {
        let policy = RetryPolicy::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let start = Instant::now();

        let outcome = run_with_retry(&policy, "step_image", |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WorkerError::task_failed("t", "provider error"))
        })
        .await
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome, GenerationOutcome::Failed { attempts: 3, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let outcome = run_with_retry(&RetryPolicy::default(), "step_image", |n| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                Err(WorkerError::timeout("slow"))
            } else {
                Ok("https://provider/out.png".to_string())
            }
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            GenerationOutcome::Succeeded {
                url: "https://provider/out.png".into(),
                attempts: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let start = Instant::now();

        let outcome = run_with_retry(&policy, "final_video", |_| async {
            std::future::pending::<WorkerResult<String>>().await
        })
        .await
        .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_validation_error_stops_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let outcome = run_with_retry(&RetryPolicy::default(), "step_video", |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WorkerError::from(ProviderError::validation("file:// source rejected")))
        })
        .await
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test]
    async fn test_invalid_policy_is_an_error() {
        let policy = RetryPolicy {
            poll_interval: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let result = run_with_retry(&policy, "x", |_| async { Ok(String::new()) }).await;
        assert!(matches!(result, Err(WorkerError::ConfigError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_wait_polls_until_terminal() {
        let provider = Arc::new(FakeProvider::new());
        provider.script(vec![
            TaskPoll::pending(),
            TaskPoll::pending(),
            TaskPoll::succeeded("https://provider/clip.mp4"),
        ]);

        let url = submit_and_wait(
            provider.as_ref(),
            &SubmitRequest::image("a dish"),
            1,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(url, "https://provider/clip.mp4");
        assert_eq!(provider.submit_count(), 1);
        assert_eq!(provider.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_wait_surfaces_terminal_failure() {
        let provider = FakeProvider::new();
        provider.script(vec![TaskPoll::failed("content moderation")]);

        let err = submit_and_wait(&provider, &SubmitRequest::image("a dish"), 1, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("content moderation"));
    }
}
