use super::openai::{self, HttpTransport, OpenAiConfig};
use super::retry::{self, RetryPolicy};
use super::{ChatMessage, CompletionRequest, CompletionTransport, LlmError};
use crate::config::LlmSettings;
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Sent instead of an instruction that trims down to nothing.
pub const EMPTY_INSTRUCTION_PLACEHOLDER: &str = "Please provide a response.";

/// One logical "answer this instruction" call with rate-limit handling.
///
/// A call makes at most `policy.max_attempts` HTTP requests. HTTP 429s are
/// retried after the provider-suggested wait (plus a buffer) or a default
/// wait; transport failures that look like rate limits are retried with a
/// linear backoff; everything else fails immediately. Every wait, and the
/// request itself, gives way to the caller's cancellation token.
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let transport = HttpTransport::new(
            OpenAiConfig {
                api_key,
                base_url: settings.base_url.clone(),
            },
            settings.timeout,
        )?;
        Ok(Self {
            transport: Arc::new(transport),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            policy: settings.retry.clone(),
        })
    }

    pub fn with_transport(transport: Arc<dyn CompletionTransport>, settings: &LlmSettings) -> Self {
        Self {
            transport,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            policy: settings.retry.clone(),
        }
    }

    pub fn build_request(&self, prompt: &str, context: Option<&str>) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            messages.push(ChatMessage::system(context));
        }
        messages.push(ChatMessage::user(prompt));
        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub async fn call(
        &self,
        instruction: impl Display,
        context: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let prompt = normalize_instruction(instruction);
        let request = self.build_request(&prompt, context);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;

            let sent = tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                sent = self.transport.post(&request) => sent,
            };

            let response = match sent {
                Ok(response) => response,
                Err(err) if retry::looks_rate_limited(&err.0) && !is_last => {
                    let wait = self.policy.transport_backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "rate limit error from transport, backing off"
                    );
                    retry::wait_or_cancel(wait, cancel).await?;
                    continue;
                }
                Err(err) => {
                    error!(attempt = attempt + 1, error = %err, "completion request failed");
                    return Err(LlmError::Transport(err.0));
                }
            };

            match response.status {
                429 if is_last => {
                    warn!(attempts = max_attempts, "rate limit persisted, giving up");
                    return Err(LlmError::RateLimited {
                        attempts: max_attempts,
                    });
                }
                429 => {
                    let message = openai::error_message(&response.body);
                    let wait = self.policy.rate_limit_wait(&message);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        "rate limit hit, waiting before retry"
                    );
                    retry::wait_or_cancel(wait, cancel).await?;
                }
                200 => {
                    let content = openai::parse_completion(&response.body).inspect_err(|e| {
                        error!(error = %e, "completions API returned an unusable body");
                    })?;
                    debug!(attempt = attempt + 1, chars = content.len(), "completion received");
                    return Ok(content);
                }
                status => {
                    error!(status, body = %response.body, "completions API error");
                    return Err(LlmError::Api {
                        status,
                        message: response.body,
                    });
                }
            }
        }

        Err(LlmError::RateLimited {
            attempts: max_attempts,
        })
    }
}

/// Trimmed text form of an instruction, never empty.
pub fn normalize_instruction(instruction: impl Display) -> String {
    let text = instruction.to_string();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        EMPTY_INSTRUCTION_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_instruction_becomes_placeholder() {
        assert_eq!(normalize_instruction("   \n"), EMPTY_INSTRUCTION_PLACEHOLDER);
        assert_eq!(normalize_instruction("  what is max height? "), "what is max height?");
        assert_eq!(normalize_instruction(42), "42");
    }
}
