//! Structural validation of generated debates.
//!
//! Validation runs on the untyped JSON tree. Only once every rule passes is
//! the tree converted into a [`GeneratedDebate`], so a typed debate always
//! satisfies the record contract.

use serde_json::Value;

use crate::config::ValidationConfig;
use crate::error::{ValidationError, ValidationRule};
use crate::record::GeneratedDebate;

const REQUIRED_FIELDS: [&str; 3] = ["question", "standpoints", "counter_questions"];

/// Checks field presence, id numbering and minimum cardinalities.
///
/// Text content is never inspected.
#[derive(Debug, Clone)]
pub struct DebateValidator {
    limits: ValidationConfig,
}

impl Default for DebateValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl DebateValidator {
    pub fn new(limits: ValidationConfig) -> Self {
        Self { limits }
    }

    /// Validate a parsed document; the first violated rule is reported.
    pub fn validate(&self, parsed: &Value) -> Result<GeneratedDebate, ValidationError> {
        let Some(object) = parsed.as_object() else {
            return Err(ValidationError::new(
                ValidationRule::MissingField,
                "top level is not an object",
            ));
        };
        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(ValidationError::new(
                    ValidationRule::MissingField,
                    format!("missing required field `{field}`"),
                ));
            }
        }

        let standpoints = sequence(&object["standpoints"]);
        if standpoints.len() < self.limits.min_standpoints {
            return Err(ValidationError::new(
                ValidationRule::StandpointCount,
                format!(
                    "expected at least {} standpoints, got {}",
                    self.limits.min_standpoints,
                    standpoints.len()
                ),
            ));
        }

        for (i, standpoint) in (1..).zip(standpoints) {
            expect_id(standpoint, &format!("standpoint_{i}"), ValidationRule::StandpointId)?;

            let arguments = sequence(&standpoint["arguments"]);
            if arguments.len() < self.limits.min_arguments_per_standpoint {
                return Err(ValidationError::new(
                    ValidationRule::ArgumentCount,
                    format!(
                        "standpoint_{i} needs at least {} arguments, got {}",
                        self.limits.min_arguments_per_standpoint,
                        arguments.len()
                    ),
                ));
            }
            for (j, argument) in (1..).zip(arguments) {
                expect_id(argument, &format!("argument_{i}_{j}"), ValidationRule::ArgumentId)?;
            }
        }

        let counter_questions = sequence(&object["counter_questions"]);
        if counter_questions.len() < self.limits.min_counter_questions {
            return Err(ValidationError::new(
                ValidationRule::CounterQuestionCount,
                format!(
                    "expected at least {} counter questions, got {}",
                    self.limits.min_counter_questions,
                    counter_questions.len()
                ),
            ));
        }
        for (i, counter) in (1..).zip(counter_questions) {
            expect_id(
                counter,
                &format!("counter_question_{i}"),
                ValidationRule::CounterQuestionId,
            )?;
        }

        serde_json::from_value(parsed.clone())
            .map_err(|e| ValidationError::new(ValidationRule::Malformed, e.to_string()))
    }
}

/// Non-arrays count as empty so they fail the cardinality rule.
fn sequence(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn expect_id(item: &Value, expected: &str, rule: ValidationRule) -> Result<(), ValidationError> {
    match item.get("id").and_then(Value::as_str) {
        Some(id) if id == expected => Ok(()),
        Some(id) => Err(ValidationError::new(
            rule,
            format!("expected id `{expected}`, found `{id}`"),
        )),
        None => Err(ValidationError::new(
            rule,
            format!("missing id, expected `{expected}`"),
        )),
    }
}
