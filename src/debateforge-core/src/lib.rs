//! DebateForge Core Library
//!
//! Expands seed questions into validated debate records through an
//! OpenAI-compatible chat API, and keeps the resulting dataset durable and
//! resumable across runs.

pub mod client;
pub mod config;
pub mod error;
pub mod fanout;
pub mod orchestrator;
pub mod questions;
pub mod record;
pub mod retry;
pub mod source;
pub mod store;
pub mod training;
pub mod validator;

#[cfg(test)]
mod testing;

pub use client::{ChatTransport, GenerationClient, HttpTransport, strip_code_fence};
pub use config::{Config, default_config};
pub use error::{
    GenerationError, PipelineError, SourceError, StoreError, TransportError, ValidationError,
    ValidationRule,
};
pub use fanout::{FanOutExpander, FanOutReport};
pub use orchestrator::{ExpansionEvent, ExpansionOrchestrator, RunSummary};
pub use questions::generate_questions;
pub use record::{DebateRecord, GeneratedDebate, SeedQuestion};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use source::QuestionSource;
pub use store::DatasetStore;
pub use validator::DebateValidator;
