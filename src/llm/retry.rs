use super::LlmError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MAX_ATTEMPTS: u32 = 3;

/// How the client paces itself after a rate-limit signal.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait used when a 429 body carries no usable hint.
    pub default_wait: Duration,
    /// Added on top of the provider's suggested wait.
    pub buffer: Duration,
    /// Step of the linear backoff applied to rate-limit-looking transport errors.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            default_wait: Duration::from_secs(3),
            buffer: Duration::from_secs(1),
            backoff_step: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying a 429 whose error message is `message`.
    pub fn rate_limit_wait(&self, message: &str) -> Duration {
        suggested_wait(message)
            .map(|hint| hint + self.buffer)
            .unwrap_or(self.default_wait)
    }

    /// Wait before retrying after the `attempt`-th (zero-based) transport failure.
    pub fn transport_backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * (attempt + 1)
    }
}

fn wait_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)try again in\s+(?:(\d+)m)?(\d+(?:\.\d+)?)(ms|s)\b")
            .expect("wait pattern is a valid regex")
    })
}

/// Provider-suggested wait embedded in free text, e.g. `Please try again in 2.5s`.
///
/// Understands `Ns`, `NmMs` and `Nms` forms.
pub fn suggested_wait(message: &str) -> Option<Duration> {
    let caps = wait_pattern().captures(message)?;
    let minutes: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let amount: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => amount / 1000.0,
        _ => amount,
    };
    Duration::try_from_secs_f64(minutes * 60.0 + seconds).ok()
}

/// Whether a transport-level failure message reads like a rate limit.
pub fn looks_rate_limited(message: &str) -> bool {
    message.contains("rate_limit_exceeded") || message.contains("429")
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), LlmError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_seconds_with_fraction() {
        let msg = "Rate limit reached for model `llama-3.1-8b-instant`. Please try again in 2.5s. Visit https://console.groq.com";
        assert_eq!(suggested_wait(msg), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn extracts_minutes_and_milliseconds() {
        assert_eq!(
            suggested_wait("Please try again in 1m30.5s."),
            Some(Duration::from_millis(90_500))
        );
        assert_eq!(
            suggested_wait("Please try again in 250ms."),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn no_hint_means_default_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(suggested_wait("slow down"), None);
        assert_eq!(policy.rate_limit_wait("slow down"), Duration::from_secs(3));
    }

    #[test]
    fn hint_gets_one_second_buffer() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_wait("Please try again in 2.5s"),
            Duration::from_millis(3500)
        );
    }

    #[test]
    fn transport_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.transport_backoff(0), Duration::from_secs(3));
        assert_eq!(policy.transport_backoff(1), Duration::from_secs(6));
    }

    #[test]
    fn rate_limit_markers() {
        assert!(looks_rate_limited("error code: rate_limit_exceeded"));
        assert!(looks_rate_limited("HTTP status 429 Too Many Requests"));
        assert!(!looks_rate_limited("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = wait_or_cancel(Duration::from_secs(60), &cancel).await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }
}
