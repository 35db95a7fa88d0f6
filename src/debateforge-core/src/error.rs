//! Error types for the expansion pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single HTTP exchange with the generation API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body is not a chat completion: {0}")]
    InvalidBody(String),
}

impl TransportError {
    /// Whether the transport layer should re-send the request.
    ///
    /// A malformed 2xx body is not retried here; the orchestrator's outer
    /// loop decides whether the whole generation is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidBody(_))
    }
}

/// The structural rule a generated debate violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    MissingField,
    StandpointCount,
    StandpointId,
    ArgumentCount,
    ArgumentId,
    CounterQuestionCount,
    CounterQuestionId,
    Malformed,
}

impl ValidationRule {
    /// Stable reason code used in logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationRule::MissingField => "missing_field",
            ValidationRule::StandpointCount => "standpoint_count",
            ValidationRule::StandpointId => "standpoint_id",
            ValidationRule::ArgumentCount => "argument_count",
            ValidationRule::ArgumentId => "argument_id",
            ValidationRule::CounterQuestionCount => "counter_question_count",
            ValidationRule::CounterQuestionId => "counter_question_id",
            ValidationRule::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A parsed debate that breaks the record contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed [{rule}]: {detail}")]
pub struct ValidationError {
    pub rule: ValidationRule,
    pub detail: String,
}

impl ValidationError {
    pub fn new(rule: ValidationRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// One failed generation attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("response is not valid JSON: {reason}")]
    Parse { reason: String, content: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors reading or writing the persisted dataset.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("dataset {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors loading the seed question file.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("seed file {path} has an unsupported shape: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Conditions that abort a whole pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
