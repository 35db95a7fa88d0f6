//! Debate record data model.
//!
//! Seed questions come in, debate records go out. A [`GeneratedDebate`] is
//! what the model produced and the validator accepted; a [`DebateRecord`]
//! is that debate plus the seed metadata, as stored in the dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_CATEGORY: &str = "哲学";
pub const DEFAULT_DIFFICULTY: &str = "中等";

/// Timestamp layout written into every record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A question to expand. Identity is the exact `question` text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeedQuestion {
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    /// Fields such as `id` that the seed file carries but we do not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SeedQuestion {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn difficulty_or_default(&self) -> &str {
        self.difficulty.as_deref().unwrap_or(DEFAULT_DIFFICULTY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Argument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

/// One position on the question, backed by its arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Standpoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterQuestion {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

/// The part of a record produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedDebate {
    pub question: String,
    pub standpoints: Vec<Standpoint>,
    pub counter_questions: Vec<CounterQuestion>,
    /// Anything else the model returned alongside the contract fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A persisted dataset entry.
///
/// Only `question` is required. Anything else that is missing or `null` in
/// an existing dataset loads as its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateRecord {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub standpoints: Vec<Standpoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub counter_questions: Vec<CounterQuestion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seed_question: SeedQuestion,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub difficulty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DebateRecord {
    /// Attach seed metadata to a validated debate.
    ///
    /// The record is keyed by the seed's text, which is what dedup compares
    /// against on the next run.
    pub fn from_generated(
        debate: GeneratedDebate,
        seed: &SeedQuestion,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut extra = debate.extra;
        for key in ["seed_question", "category", "difficulty", "timestamp"] {
            extra.remove(key);
        }

        Self {
            question: seed.question.clone(),
            standpoints: debate.standpoints,
            counter_questions: debate.counter_questions,
            seed_question: seed.clone(),
            category: seed.category_or_default().to_string(),
            difficulty: seed.difficulty_or_default().to_string(),
            timestamp: timestamp.into(),
            extra,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Current local time in the record timestamp layout.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seed_question_keeps_unknown_fields() {
        let seed: SeedQuestion = serde_json::from_value(json!({
            "id": 7,
            "question": "自由意志是否真实存在？",
            "category": "形而上学",
            "tags": ["自由意志"]
        }))
        .unwrap();

        assert_eq!(seed.category_or_default(), "形而上学");
        assert_eq!(seed.difficulty_or_default(), DEFAULT_DIFFICULTY);
        assert_eq!(seed.extra.get("id"), Some(&json!(7)));

        let back = serde_json::to_value(&seed).unwrap();
        assert_eq!(back["id"], json!(7));
        assert!(back.get("difficulty").is_none());
    }

    #[test]
    fn test_from_generated_attaches_metadata() {
        let debate = GeneratedDebate {
            question: "model paraphrase".to_string(),
            standpoints: vec![],
            counter_questions: vec![],
            extra: BTreeMap::from([
                ("summary".to_string(), json!("kept")),
                ("category".to_string(), json!("model says")),
            ]),
        };
        let seed = SeedQuestion::new("原始问题").with_difficulty("高");

        let record = DebateRecord::from_generated(debate, &seed, "2024-01-01 00:00:00");

        assert_eq!(record.question, "原始问题");
        assert_eq!(record.category, DEFAULT_CATEGORY);
        assert_eq!(record.difficulty, "高");
        assert_eq!(record.seed_question, seed);
        assert_eq!(record.extra.get("summary"), Some(&json!("kept")));
        assert!(!record.extra.contains_key("category"));
    }

    #[test]
    fn test_null_seed_question_reads_as_empty() {
        let seeds: Vec<SeedQuestion> =
            serde_json::from_value(json!([{"question": null, "tags": null}, {"question": "b"}]))
                .unwrap();

        assert_eq!(seeds[0].question, "");
        assert!(seeds[0].tags.is_empty());
        assert_eq!(seeds[1].question, "b");
    }

    #[test]
    fn test_null_record_fields_load_as_defaults() {
        let record: DebateRecord = serde_json::from_value(json!({
            "question": "a",
            "difficulty": null,
            "category": null,
            "seed_question": {"question": "a", "difficulty": null},
            "standpoints": [{"id": "standpoint_1", "text": null, "arguments": null}],
            "counter_questions": null
        }))
        .unwrap();

        assert_eq!(record.difficulty, "");
        assert_eq!(record.category, "");
        assert_eq!(record.seed_question.difficulty_or_default(), DEFAULT_DIFFICULTY);
        assert!(record.standpoints[0].arguments.is_empty());
        assert!(record.counter_questions.is_empty());
    }

    #[test]
    fn test_record_without_question_is_rejected() {
        let result = serde_json::from_value::<DebateRecord>(json!({"difficulty": "高"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_layout() {
        let ts = now_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
