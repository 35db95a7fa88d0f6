//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{ChatRequest, ChatTransport};
use crate::error::TransportError;
use crate::retry::Sleeper;

/// Records requested sleeps instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(duration);
    }
}

/// Replies from a queue; once the queue is empty, falls back to a valid
/// debate for whatever question the request carries.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Result<String, TransportError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<String, TransportError>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn push_ok(&self, content: impl Into<String>) -> &Self {
        self.push(Ok(content.into()))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Questions asked so far, in request order.
    pub fn questions(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.messages.last())
            .map(|m| last_line_question(&m.content))
            .collect()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        let question = request
            .messages
            .last()
            .map(|m| last_line_question(&m.content))
            .unwrap_or_default();
        Ok(valid_debate(&question).to_string())
    }
}

/// Test prompts end with `问题：<question>`, as the default template does.
fn last_line_question(prompt: &str) -> String {
    prompt
        .lines()
        .last()
        .and_then(|l| l.strip_prefix("问题："))
        .unwrap_or(prompt)
        .to_string()
}

/// Smallest debate that satisfies the default validation thresholds.
pub fn valid_debate(question: &str) -> Value {
    json!({
        "question": question,
        "standpoints": [
            {
                "id": "standpoint_1",
                "text": "立场一",
                "arguments": [
                    { "id": "argument_1_1", "text": "论据一" },
                    { "id": "argument_1_2", "text": "论据二" }
                ]
            },
            {
                "id": "standpoint_2",
                "text": "立场二",
                "arguments": [
                    { "id": "argument_2_1", "text": "论据三" },
                    { "id": "argument_2_2", "text": "论据四" }
                ]
            }
        ],
        "counter_questions": [
            { "id": "counter_question_1", "text": "反问一" },
            { "id": "counter_question_2", "text": "反问二" }
        ]
    })
}
