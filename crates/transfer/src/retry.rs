use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::transport::{ProgressFn, TransportError, UploadRequest, UploadTransport};

/// Maximum transmission attempts per record, including the first.
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Retry policy for transient transport failures.
///
/// The computed checksum is reused verbatim across attempts; content is
/// never re-verified between retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt bound, including the first try.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_UPLOAD_ATTEMPTS,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculates the backoff delay after a given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Drives one transport send to completion with bounded retries.
///
/// `on_attempt` runs before every try (first included) with the 1-based
/// attempt number, so the caller can reset per-attempt progress state.
/// Only transient errors are retried; once the attempt bound is exhausted
/// the last attempt's error is returned.
pub async fn send_with_retry(
    transport: &dyn UploadTransport,
    req: UploadRequest<'_>,
    policy: &RetryPolicy,
    progress: ProgressFn,
    mut on_attempt: impl FnMut(u32),
) -> Result<(), TransportError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        on_attempt(attempt);
        match transport.send(req, Arc::clone(&progress)).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    payload = req.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient upload failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
