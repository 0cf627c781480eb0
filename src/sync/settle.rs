use crate::config::SettleConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Re-reads a value until two consecutive reads agree.
///
/// Used after writes that make the backend run its own internal sync, where
/// the first read may still see the pre-write state. The loop is bounded, so
/// a backend that never settles costs at most `max_attempts` reads.
pub struct SettlePolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome<T> {
    Stable { value: T, attempts: u32 },
    Exhausted { value: T, attempts: u32 },
    /// The owner went away; `attempts` reads were issued before it did.
    Cancelled { attempts: u32 },
}

impl<T> SettleOutcome<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            SettleOutcome::Stable { value, .. } | SettleOutcome::Exhausted { value, .. } => {
                Some(value)
            }
            SettleOutcome::Cancelled { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SettleOutcome::Stable { attempts, .. }
            | SettleOutcome::Exhausted { attempts, .. }
            | SettleOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

impl SettlePolicy {
    pub fn new(config: &SettleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            backoff_factor: config.backoff_factor.max(1),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.saturating_pow(attempt);
        self.initial_delay.saturating_mul(multiplier)
    }

    /// A failed read is retried only when it is transient and budget remains.
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt + 1 < self.max_attempts
    }

    pub async fn wait_before_attempt(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        tracing::debug!(
            "Settle read {} of {} in {}ms",
            attempt + 1,
            self.max_attempts,
            delay.as_millis()
        );
        sleep(delay).await;
    }

    /// `baseline` counts as the first read. Failed reads for which
    /// `retryable` holds use up an attempt; any other failure aborts.
    pub async fn settle<T, E, F, Fut, R>(
        &self,
        baseline: T,
        cancel: &CancellationToken,
        mut read: F,
        retryable: R,
    ) -> Result<SettleOutcome<T>, E>
    where
        T: PartialEq,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut previous = baseline;

        for attempt in 0..self.max_attempts {
            let step = async {
                self.wait_before_attempt(attempt).await;
                read().await
            };
            let result = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Ok(SettleOutcome::Cancelled { attempts: attempt });
                }

                result = step => result,
            };

            match result {
                Ok(next) if next == previous => {
                    return Ok(SettleOutcome::Stable {
                        value: next,
                        attempts: attempt + 1,
                    });
                }
                Ok(next) => previous = next,
                Err(e) if self.should_retry(attempt, retryable(&e)) => {
                    tracing::debug!("Settle read {} failed, retrying: {}", attempt + 1, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(SettleOutcome::Exhausted {
            value: previous,
            attempts: self.max_attempts,
        })
    }
}
