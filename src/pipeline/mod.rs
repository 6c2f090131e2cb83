// SPDX-License-Identifier: Apache-2.0

//! The per-entry processing pipeline: pattern extraction followed by
//! enrichment. One `Pipeline` is built per input and shared read-only by
//! every connection serving that input.

pub mod aggregate;
pub mod enrich;
pub mod extract;

use std::sync::Arc;

use crate::config::Input;
use crate::pipeline::enrich::{Enricher, PhpErrorCompat, RecordTransform};
use crate::pipeline::extract::FieldExtractor;

/// One structured log event, mapping field names to values. Ordering of
/// keys is not significant.
pub type LogRecord = serde_json::Map<String, serde_json::Value>;

/// Field holding the raw entry text when no extraction pattern matched.
pub const FALLBACK_KEY: &str = "message";

pub struct Pipeline {
    input: Arc<Input>,
    extractor: FieldExtractor,
    enricher: Enricher,
}

impl Pipeline {
    /// Build the standard pipeline for an input, with the built-in
    /// legacy PHP error transform installed.
    pub fn new(input: Arc<Input>) -> Self {
        Self::with_transforms(input, vec![Box::new(PhpErrorCompat)])
    }

    /// Build a pipeline with an explicit set of enrichment transforms.
    pub fn with_transforms(input: Arc<Input>, transforms: Vec<Box<dyn RecordTransform>>) -> Self {
        let extractor = FieldExtractor::new(input.clone());
        let mut enricher = Enricher::new(input.clone());
        for transform in transforms {
            enricher = enricher.with_transform(transform);
        }
        Self {
            input,
            extractor,
            enricher,
        }
    }

    pub fn input(&self) -> &Arc<Input> {
        &self.input
    }

    /// Map one complete entry to a finished record. Empty (after trim)
    /// entries produce no record.
    pub fn process(&self, entry: &str) -> Option<LogRecord> {
        let mut record = self.extractor.extract(entry)?;
        self.enricher.enrich(&mut record);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputConfig, MultilineConfig, TagConfig, TransportKind};
    use serde_json::Value;
    use std::path::PathBuf;

    fn make_input(tags: Vec<(&str, &str)>, parsers: Vec<&str>) -> Arc<Input> {
        let config = InputConfig {
            path: PathBuf::from("/tmp/test.pipe"),
            kind: TransportKind::Pipe,
            tags: tags
                .into_iter()
                .map(|(name, value)| TagConfig {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            multiline: MultilineConfig::default(),
            parsers: parsers.into_iter().map(|p| p.to_string()).collect(),
        };
        Arc::new(config.compile().unwrap())
    }

    #[test]
    fn test_no_parsers_yields_fallback_plus_tags() {
        let pipeline = Pipeline::new(make_input(vec![("team", "platform")], vec![]));

        let record = pipeline.process("plain text line").unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record[FALLBACK_KEY], Value::String("plain text line".into()));
        assert_eq!(record["team"], Value::String("platform".into()));
    }

    #[test]
    fn test_empty_entry_yields_no_record() {
        let pipeline = Pipeline::new(make_input(vec![("team", "platform")], vec![]));
        assert!(pipeline.process("").is_none());
        assert!(pipeline.process("   \t ").is_none());
    }

    #[test]
    fn test_pattern_match_with_tags() {
        let pipeline = Pipeline::new(make_input(
            vec![("env", "prod")],
            vec![r"^(?P<severity>\w+): (?P<msg>.*)$"],
        ));

        let record = pipeline.process("warn: disk nearly full").unwrap();
        assert_eq!(record["severity"], Value::String("warn".into()));
        assert_eq!(record["msg"], Value::String("disk nearly full".into()));
        assert_eq!(record["env"], Value::String("prod".into()));
        assert!(!record.contains_key(FALLBACK_KEY));
    }

    #[test]
    fn test_json_fallback_is_expanded() {
        let pipeline = Pipeline::new(make_input(vec![], vec![]));

        let record = pipeline.process(r#"{"a":1,"b":"two"}"#).unwrap();
        assert_eq!(record["a"], Value::from(1));
        assert_eq!(record["b"], Value::String("two".into()));
        assert!(!record.contains_key(FALLBACK_KEY));
    }

    #[test]
    fn test_process_is_deterministic() {
        let pipeline = Pipeline::new(make_input(
            vec![("team", "platform")],
            vec![r"^(?P<key>\w+)=(?P<value>\w+)$"],
        ));

        let first = pipeline.process("foo=bar").unwrap();
        for _ in 0..10 {
            assert_eq!(pipeline.process("foo=bar").unwrap(), first);
        }
    }
}
