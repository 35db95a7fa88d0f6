//! Configuration module for loading TOML config files.
//!
//! A [`Config`] is built once at process start and handed to each component
//! by reference. Every section has defaults, so a config file only needs
//! the values it changes.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::{Jitter, RetryPolicy};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub pipeline: PipelineConfig,
    pub validation: ValidationConfig,
    pub paths: PathsConfig,
    pub prompts: PromptsConfig,
}

/// Generation API connection and sampling settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// First transport backoff; doubles per attempt.
    pub retry_base_secs: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            timeout_secs: 60,
            max_retries: 5,
            retry_base_secs: 1.0,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_secs", &self.retry_base_secs)
            .finish()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for individual HTTP requests: exponential, no jitter.
    pub fn transport_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, secs(self.retry_base_secs))
    }
}

/// Batching, pacing and outer-retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub delay_between_requests_secs: f64,
    pub batch_delay_multiplier: f64,
    /// Only used by the fan-out variant.
    pub max_concurrent_requests: usize,
    pub max_retries: u32,
    pub outer_retry_base_secs: f64,
    pub jitter_secs: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            delay_between_requests_secs: 5.0,
            batch_delay_multiplier: 3.0,
            max_concurrent_requests: 3,
            max_retries: 5,
            outer_retry_base_secs: 1.0,
            jitter_secs: 1.0,
        }
    }
}

impl PipelineConfig {
    pub fn request_delay(&self) -> Duration {
        secs(self.delay_between_requests_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        secs(self.delay_between_requests_secs * self.batch_delay_multiplier)
    }

    pub fn jitter(&self) -> Jitter {
        Jitter::Uniform(secs(self.jitter_secs))
    }

    /// Retry policy for whole generations: exponential plus random jitter.
    pub fn generation_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, secs(self.outer_retry_base_secs))
            .with_jitter(self.jitter())
    }
}

/// Minimum cardinalities enforced on seeds and generated debates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_questions: usize,
    pub min_standpoints: usize,
    pub min_arguments_per_standpoint: usize,
    pub min_counter_questions: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_questions: 1,
            min_standpoints: 2,
            min_arguments_per_standpoint: 2,
            min_counter_questions: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub seed_questions: PathBuf,
    pub dataset: PathBuf,
    pub training_output: PathBuf,
    /// Log file written alongside console output; console only when unset.
    pub log_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            seed_questions: PathBuf::from("data/seed_questions.json"),
            dataset: PathBuf::from("data/philosophical_debates.json"),
            training_output: PathBuf::from("data/expanded_training.jsonl"),
            log_file: None,
        }
    }
}

/// System instruction and user template sent with every generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub system_prompt: String,
    /// Must contain a `{question}` placeholder.
    pub user_template: String,
}

impl PromptsConfig {
    /// The user message for `question`.
    pub fn user_prompt(&self, question: &str) -> String {
        self.user_template.replace("{question}", question)
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_template: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

const DEFAULT_SYSTEM_PROMPT: &str = "你是一个专业的哲学思辨图谱数据生成助手。你的任务是根据给定的哲学问题，\
生成包含不同立场、支持论据和反问的思辨图谱数据。请严格遵循指定的JSON格式输出，\
并确保内容的哲学深度和逻辑严谨性。";

const DEFAULT_USER_TEMPLATE: &str = r#"请基于以下哲学问题，生成包含不同立场、支持论据和反问的思辨图谱数据。请严格按照以下JSON格式输出：

{
  "question": "{question}",
  "standpoints": [
    {
      "id": "standpoint_1",
      "text": "[立场1的陈述]",
      "arguments": [
        { "id": "argument_1_1", "text": "[支持立场1的论据1]" },
        { "id": "argument_1_2", "text": "[支持立场1的论据2]" }
      ]
    },
    {
      "id": "standpoint_2",
      "text": "[立场2的陈述]",
      "arguments": [
        { "id": "argument_2_1", "text": "[支持立场2的论据1]" },
        { "id": "argument_2_2", "text": "[支持立场2的论据2]" }
      ]
    }
  ],
  "counter_questions": [
    { "id": "counter_question_1", "text": "[针对上述立场或论据的反问1]" },
    { "id": "counter_question_2", "text": "[针对上述立场或论据的反问2]" }
  ]
}

要求：
1. 立场应该对立或互补，体现问题的复杂性
2. 论据要有哲学深度，避免常识性表述
3. 反问要能引发深层思考，挑战现有观点
4. 编号必须连续：standpoint_N、argument_N_M、counter_question_N
5. 确保JSON格式正确，所有字段完整

问题：{question}"#;
