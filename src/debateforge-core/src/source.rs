//! Seed question loading.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{error, info};

use crate::error::SourceError;
use crate::record::SeedQuestion;

/// Reads seed questions from a JSON file holding either a bare list or an
/// object with a `questions` list.
#[derive(Debug, Clone)]
pub struct QuestionSource {
    path: PathBuf,
}

impl QuestionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all seed questions.
    ///
    /// A missing or unparseable file is logged and yields no questions. A
    /// parseable file of the wrong shape is an error.
    pub fn load(&self) -> Result<Vec<SeedQuestion>, SourceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!(path = %self.path.display(), "seed question file not found");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: Value = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to parse seed questions");
                return Ok(Vec::new());
            }
        };

        let questions = self.parse(document)?;
        info!(path = %self.path.display(), count = questions.len(), "loaded seed questions");
        Ok(questions)
    }

    fn parse(&self, document: Value) -> Result<Vec<SeedQuestion>, SourceError> {
        let list = match document {
            Value::Array(_) => document,
            Value::Object(mut object) => match object.remove("questions") {
                Some(list @ Value::Array(_)) => list,
                Some(_) => return Err(self.format_error("`questions` is not a list")),
                None => return Err(self.format_error("object has no `questions` field")),
            },
            _ => return Err(self.format_error("expected a list or an object")),
        };

        serde_json::from_value(list).map_err(|e| self.format_error(&e.to_string()))
    }

    fn format_error(&self, reason: &str) -> SourceError {
        SourceError::Format {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn source_with(content: &str) -> (tempfile::TempDir, QuestionSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.json");
        fs::write(&path, content).unwrap();
        (dir, QuestionSource::new(path))
    }

    #[test]
    fn test_bare_list() {
        let (_dir, source) =
            source_with(r#"[{"question": "a"}, {"question": "b", "difficulty": "高"}]"#);
        let seeds = source.load().unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].difficulty.as_deref(), Some("高"));
    }

    #[test]
    fn test_wrapped_list() {
        let (_dir, source) =
            source_with(r#"{"questions": [{"id": 1, "question": "a", "tags": ["x"]}]}"#);
        let seeds = source.load().unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].tags, vec!["x".to_string()]);
        assert!(seeds[0].extra.contains_key("id"));
    }

    #[test]
    fn test_other_shapes_are_format_errors() {
        for content in [r#"{"items": []}"#, r#"{"questions": "a"}"#, "42", r#"[1, 2]"#] {
            let (_dir, source) = source_with(content);
            assert!(
                matches!(source.load(), Err(SourceError::Format { .. })),
                "{content} should be rejected"
            );
        }
    }

    #[test]
    fn test_null_question_is_kept_as_empty_seed() {
        let (_dir, source) = source_with(r#"[{"question": null}, {"question": "b"}]"#);
        let seeds = source.load().unwrap();
        assert_eq!(seeds.len(), 2);
        assert!(seeds[0].question.is_empty());
        assert_eq!(seeds[1].question, "b");
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = QuestionSource::new(dir.path().join("absent.json"));
        assert!(source.load().unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_file_yields_nothing() {
        let (_dir, source) = source_with("{ not json");
        assert!(source.load().unwrap().is_empty());
    }
}
