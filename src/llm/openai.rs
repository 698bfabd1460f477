use super::{CompletionRequest, CompletionTransport, LlmError, RawResponse, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// reqwest-backed transport for any OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpTransport {
    client: Client,
    config: OpenAiConfig,
}

impl HttpTransport {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn post(&self, request: &CompletionRequest) -> Result<RawResponse, TransportError> {
        let mut req = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(request);

        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Pull `choices[0].message.content` out of a successful response body.
pub fn parse_completion(body: &str) -> Result<String, LlmError> {
    let data: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let choice = data
        .choices
        .and_then(|choices| choices.into_iter().next())
        .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))?;

    choice
        .message
        .and_then(|m| m.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::Parse("choice has no message content".to_string()))
}

/// Human-readable message from an error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_and_trims() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  42 \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "42");
    }

    #[test]
    fn missing_or_empty_choices_is_a_parse_error() {
        for body in [r#"{"id":"x"}"#, r#"{"choices":[]}"#, r#"{"choices":[{}]}"#, "not json"] {
            assert!(
                matches!(parse_completion(body), Err(LlmError::Parse(_))),
                "body {body:?} should fail"
            );
        }
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"Please try again in 2.5s.","type":"tokens"}}"#;
        assert_eq!(error_message(body), "Please try again in 2.5s.");
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let transport = HttpTransport::new(
            OpenAiConfig {
                api_key: String::new(),
                base_url: "https://api.groq.com/openai/v1/".to_string(),
            },
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(
            transport.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
