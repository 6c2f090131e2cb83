// SPDX-License-Identifier: Apache-2.0

//! Record enrichment: JSON fallback expansion, pluggable compatibility
//! transforms, and tag attachment.

use std::sync::Arc;

use serde_json::Value;

use crate::config::Input;
use crate::pipeline::{LogRecord, FALLBACK_KEY};

/// A record-level transform applied after fallback expansion and before
/// tag attachment.
pub trait RecordTransform: Send + Sync {
    fn apply(&self, record: &mut LogRecord);
}

/// Legacy PHP error shape: when `event_type` is `php.error`, downstream
/// consumers expect a `php_error_log` field holding a JSON-encoded
/// string embedding the severity and message.
pub struct PhpErrorCompat;

const PHP_ERROR_EVENT_TYPE: &str = "php.error";
const PHP_ERROR_FIELD: &str = "php_error_log";

impl RecordTransform for PhpErrorCompat {
    fn apply(&self, record: &mut LogRecord) {
        let event_type = record.get("event_type").and_then(Value::as_str);
        if event_type != Some(PHP_ERROR_EVENT_TYPE) {
            return;
        }

        let level = record
            .get("severity")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let error = record
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let nested = serde_json::json!({ "error": error, "level": level });
        record.insert(
            PHP_ERROR_FIELD.to_string(),
            Value::String(nested.to_string()),
        );
    }
}

pub struct Enricher {
    input: Arc<Input>,
    transforms: Vec<Box<dyn RecordTransform>>,
}

impl Enricher {
    pub fn new(input: Arc<Input>) -> Self {
        Self {
            input,
            transforms: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Box<dyn RecordTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Finalize a record: expand a JSON-object fallback in place, apply
    /// the configured transforms, then attach tags. Env-referencing tags
    /// are resolved against the process environment now, never cached.
    pub fn enrich(&self, record: &mut LogRecord) {
        self.expand_fallback(record);

        for transform in &self.transforms {
            transform.apply(record);
        }

        for tag in &self.input.tags {
            record.insert(tag.name.clone(), Value::String(tag.value.resolve()));
        }
    }

    /// Upstream logs that are already structured arrive as a JSON object
    /// in the fallback field; merge them transparently.
    fn expand_fallback(&self, record: &mut LogRecord) {
        let parsed = match record.get(FALLBACK_KEY) {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
            _ => None,
        };

        if let Some(Value::Object(fields)) = parsed {
            record.remove(FALLBACK_KEY);
            for (key, value) in fields {
                record.insert(key, value);
            }
        }
    }
}
