//! Generation client for the chat-completion API.
//!
//! One [`GenerationClient::generate`] call turns a question into a validated
//! [`GeneratedDebate`]: build the request, send it with transport retries,
//! strip Markdown fences, parse, then validate.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ApiConfig, Config, PromptsConfig};
use crate::error::{ConfigError, GenerationError, TransportError};
use crate::record::GeneratedDebate;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::validator::DebateValidator;

/// A message in a chat-completion request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `POST <base>/chat/completions`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Sends one chat request and returns the assistant text.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError>;
}

/// HTTP transport over reqwest with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(api: &ApiConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(api.timeout())
            .connect_timeout(Duration::from_secs(30).min(api.timeout()))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", api.base_url.trim_end_matches('/')),
            api_key: api.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::InvalidBody(e.to_string())
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TransportError::InvalidBody("no message content in choices".into()))
    }
}

/// Turns questions into validated debates.
pub struct GenerationClient<T: ChatTransport, S: Sleeper = TokioSleeper> {
    transport: T,
    sleeper: S,
    api: ApiConfig,
    prompts: PromptsConfig,
    retry: RetryPolicy,
    validator: DebateValidator,
}

impl<T: ChatTransport, S: Sleeper> GenerationClient<T, S> {
    pub fn new(transport: T, config: &Config, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            api: config.api.clone(),
            prompts: config.prompts.clone(),
            retry: config.api.transport_retry(),
            validator: DebateValidator::new(config.validation.clone()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request for one question.
    pub fn build_request(&self, question: &str) -> ChatRequest {
        ChatRequest {
            model: self.api.model.clone(),
            messages: vec![
                ChatMessage::system(&self.prompts.system_prompt),
                ChatMessage::user(self.prompts.user_prompt(question)),
            ],
            temperature: self.api.temperature,
            max_tokens: self.api.max_tokens,
            top_p: self.api.top_p,
            frequency_penalty: self.api.frequency_penalty,
            presence_penalty: self.api.presence_penalty,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }

    /// Generate and validate a debate for `question`.
    ///
    /// Transport failures are retried here; parse and validation failures
    /// are returned immediately for the caller to decide on.
    pub async fn generate(&self, question: &str) -> Result<GeneratedDebate, GenerationError> {
        let request = self.build_request(question);

        let content = self
            .retry
            .run(
                &self.sleeper,
                "transport",
                TransportError::is_retryable,
                |_| self.transport.send(&request),
            )
            .await?;

        let stripped = strip_code_fence(&content);
        let parsed: Value = serde_json::from_str(stripped).map_err(|e| {
            debug!(content = %stripped, "unparseable response");
            GenerationError::Parse {
                reason: e.to_string(),
                content: stripped.to_string(),
            }
        })?;

        let debate = self.validator.validate(&parsed)?;
        info!(
            standpoints = debate.standpoints.len(),
            counter_questions = debate.counter_questions.len(),
            "generated debate"
        );
        Ok(debate)
    }
}

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?(.*?)(?:```|\z)").ok());

/// Unwrap a ```` ```json ```` or bare ```` ``` ```` fenced block.
///
/// A missing closing fence, as left by a truncated reply, runs to the end of
/// the text. Text without a fence is returned trimmed.
pub fn strip_code_fence(content: &str) -> &str {
    let inner = FENCE
        .as_ref()
        .and_then(|re| re.captures(content))
        .and_then(|c| c.get(1));
    match inner {
        Some(inner) => inner.as_str().trim(),
        None => content.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::error::ValidationRule;
    use crate::testing::{RecordingSleeper, ScriptedTransport, valid_debate};

    type TestClient = GenerationClient<ScriptedTransport, RecordingSleeper>;

    fn client(transport: ScriptedTransport) -> (TestClient, RecordingSleeper) {
        let sleeper = RecordingSleeper::default();
        (
            GenerationClient::new(transport, &default_config(), sleeper.clone()),
            sleeper,
        )
    }

    #[test]
    fn test_strip_json_fence() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_uppercase_json_fence() {
        assert_eq!(strip_code_fence("```JSON\n{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_unclosed_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_unfenced_text_is_trimmed() {
        assert_eq!(strip_code_fence("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_request_shape() {
        let (client, _) = client(ScriptedTransport::new());
        let request = client.build_request("美是主观的吗？");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"].as_str().unwrap().contains("美是主观的吗？"));
        assert!(body.get("top_p").is_none());
    }

    #[tokio::test]
    async fn test_two_transport_failures_then_success() {
        let transport = ScriptedTransport::new();
        transport
            .push(Err(TransportError::Timeout))
            .push(Err(TransportError::Status { status: 503, body: String::new() }))
            .push_ok(valid_debate("q").to_string());
        let (client, sleeper) = client(transport.clone());

        let debate = client.generate("q").await.unwrap();

        assert_eq!(debate.question, "q");
        assert_eq!(transport.request_count(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_transport_error_after_exhausting_retries() {
        let transport = ScriptedTransport::new();
        for _ in 0..5 {
            transport.push(Err(TransportError::Connection("refused".into())));
        }
        let (client, sleeper) = client(transport.clone());

        let err = client.generate("q").await.unwrap_err();

        assert!(matches!(err, GenerationError::Transport(TransportError::Connection(_))));
        assert_eq!(transport.request_count(), 5);
        assert_eq!(sleeper.recorded().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_body_is_not_resent() {
        let transport = ScriptedTransport::new();
        transport.push(Err(TransportError::InvalidBody("no choices".into())));
        let (client, _) = client(transport.clone());

        assert!(client.generate("q").await.is_err());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push_ok("I'm sorry, I cannot produce JSON today.");
        let (client, sleeper) = client(transport.clone());

        let err = client.generate("q").await.unwrap_err();

        assert!(matches!(err, GenerationError::Parse { .. }));
        assert_eq!(transport.request_count(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_fenced_response_is_parsed() {
        let transport = ScriptedTransport::new();
        transport.push_ok(format!("```json\n{}\n```", valid_debate("q")));
        let (client, _) = client(transport);

        assert!(client.generate("q").await.is_ok());
    }

    #[tokio::test]
    async fn test_unclosed_fence_response_is_parsed() {
        let transport = ScriptedTransport::new();
        transport.push_ok(format!("```json\n{}", valid_debate("q")));
        let (client, _) = client(transport);

        let debate = client.generate("q").await.unwrap();
        assert_eq!(debate.standpoints.len(), 2);
    }

    #[test]
    fn test_request_uses_configured_template() {
        let mut config = default_config();
        config.prompts.user_template = "Q: {question}".to_string();
        let client =
            GenerationClient::new(ScriptedTransport::new(), &config, RecordingSleeper::default());

        let request = client.build_request("why?");
        assert_eq!(request.messages[1].content, "Q: why?");
    }

    #[tokio::test]
    async fn test_validation_error_carries_rule() {
        let mut debate = valid_debate("q");
        debate["standpoints"][1]["id"] = serde_json::json!("standpoint_3");
        let transport = ScriptedTransport::new();
        transport.push_ok(debate.to_string());
        let (client, _) = client(transport);

        match client.generate("q").await {
            Err(GenerationError::Validation(e)) => assert_eq!(e.rule, ValidationRule::StandpointId),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
