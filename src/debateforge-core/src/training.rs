//! Reduction of debate records into instruction-tuning examples.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::DebateRecord;

pub const STANDPOINT_CATEGORY: &str = "哲学思辨-立场论据";
pub const COUNTER_QUESTION_CATEGORY: &str = "哲学思辨-反问";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingExample {
    pub instruction: String,
    pub input: String,
    pub output: String,
    pub category: String,
}

/// One example per standpoint, then one per counter-question aimed at a
/// randomly chosen standpoint.
pub fn to_training_examples<R: Rng + ?Sized>(
    record: &DebateRecord,
    rng: &mut R,
) -> Vec<TrainingExample> {
    let question = &record.question;
    let mut examples =
        Vec::with_capacity(record.standpoints.len() + record.counter_questions.len());

    for standpoint in &record.standpoints {
        let arguments = standpoint
            .arguments
            .iter()
            .map(|a| format!("- {}", a.text))
            .collect::<Vec<_>>()
            .join("\n");
        examples.push(TrainingExample {
            instruction: format!(
                "请基于以下哲学问题，提出一个明确的立场并给出支持论据：\n\n问题：{question}\n\n立场：{}",
                standpoint.text
            ),
            input: String::new(),
            output: format!("论据：\n{arguments}"),
            category: STANDPOINT_CATEGORY.to_string(),
        });
    }

    for counter in &record.counter_questions {
        let Some(target) = record.standpoints.choose(rng) else {
            break;
        };
        examples.push(TrainingExample {
            instruction: format!(
                "请针对以下哲学立场，提出一个具有挑战性的反问：\n\n问题：{question}\n立场：{}\n",
                target.text
            ),
            input: String::new(),
            output: format!("反问：{}", counter.text),
            category: COUNTER_QUESTION_CATEGORY.to_string(),
        });
    }

    examples
}

/// JSON Lines, one example per line, non-ASCII kept literal.
pub fn encode_jsonl(examples: &[TrainingExample]) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    for example in examples {
        serde_json::to_writer(&mut bytes, example)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}
