//! Paces GitHub API calls to stay within the rate limit.
//!
//! See: <https://docs.github.com/en/rest/using-the-rest-api/rate-limits-for-the-rest-api>

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tokio::time::Instant;
use tracing::{debug, warn};

/// The header reporting how many calls are left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// The header reporting when the current window resets, in epoch seconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// The inter-call interval above which API usage looks suspicious and backoff kicks in.
pub const CALL_INTERVAL_BACKOFF_LIMIT: Duration = Duration::from_secs(2);

/// Tracks when the last call was made and how long to wait before the next one.
///
/// A single [`Governor`] is shared by every API call in the process, behind one lock held from waiting through to [`Governor::record`].
#[derive(Debug, Clone)]
pub struct Governor {
    last_call: Instant,
    interval: Duration,
    backoff_threshold: Duration,
}

impl Default for Governor {
    fn default() -> Self {
        Self::new()
    }
}

impl Governor {
    /// Creates a [`Governor`] that allows the next call immediately.
    pub fn new() -> Self {
        Self {
            last_call: Instant::now(),
            interval: Duration::ZERO,
            backoff_threshold: CALL_INTERVAL_BACKOFF_LIMIT,
        }
    }

    /// Replaces the interval above which backoff kicks in.
    pub fn with_backoff_threshold(mut self, threshold: Duration) -> Self {
        self.backoff_threshold = threshold;
        self
    }

    /// The current minimum duration between calls.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The earliest instant the next call may be made at.
    pub fn next_call(&self) -> Instant {
        self.last_call + self.interval
    }

    /// Sleeps until the next call is allowed.
    pub async fn wait(&self) {
        let next = self.next_call();
        if next > Instant::now() {
            debug!("throttling API call for {:?}…", next - Instant::now());
            tokio::time::sleep_until(next).await;
        }
    }

    /// Records that a call has just been answered with `headers`.
    pub fn record(&mut self, headers: &HeaderMap) {
        self.last_call = Instant::now();

        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        self.update(header(REMAINING_HEADER), header(RESET_HEADER), Utc::now());
    }

    /// Recomputes the interval as the time left until the reset divided by the calls remaining.
    ///
    /// Leaves the interval unchanged when the values are missing, invalid, or no calls remain.
    pub fn update(&mut self, remaining: Option<&str>, reset: Option<&str>, now: DateTime<Utc>) {
        let (Some(remaining_text), Some(reset_text)) = (remaining, reset) else {
            warn!("missing rate-limit headers!");
            return;
        };

        let remaining = match remaining_text.trim().parse::<u32>() {
            Ok(remaining) => remaining,
            Err(err) => {
                warn!("invalid rate-limit remaining {remaining_text:?}: {err}");
                return;
            }
        };
        let Some(reset) = reset_text
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        else {
            warn!("invalid rate-limit reset {reset_text:?}");
            return;
        };

        if remaining == 0 {
            warn!(
                "rate limit exhausted until {reset}! keeping API call interval at {:?}",
                self.interval
            );
            return;
        }

        let to_reset = (reset - now).to_std().unwrap_or(Duration::ZERO);
        self.interval = to_reset / remaining;
        debug!(
            "new API call interval {:?}, thanks to {remaining} calls remaining for the next {to_reset:?}",
            self.interval
        );

        if self.interval > self.backoff_threshold {
            // API usage is expected to be light, so anything above the threshold means something is off
            let factor = u32::try_from(self.interval.as_secs().max(1)).unwrap_or(u32::MAX);
            self.interval = self.interval.saturating_mul(factor);
            warn!(
                "suspicious rate-limit behaviour! {remaining} calls remaining for the next {to_reset:?}, interval increased to {:?}",
                self.interval
            );
        }
    }
}
