// SPDX-License-Identifier: Apache-2.0

//! Ordered named-capture pattern extraction.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::config::Input;
use crate::pipeline::{LogRecord, FALLBACK_KEY};

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("pattern must contain at least one named capture group (use (?P<name>...) syntax)")]
    NoNamedGroups,
}

/// An extraction pattern with named capture groups, compiled once at
/// configuration-load time.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    /// Names of the capture groups (excluding the full match)
    group_names: Vec<String>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern)?;

        let group_names: Vec<String> = regex
            .capture_names()
            .skip(1) // the full match has index 0
            .flatten()
            .map(|s| s.to_string())
            .collect();

        // A pattern with no named groups could never produce a
        // qualifying match, so reject it up front.
        if group_names.is_empty() {
            return Err(PatternError::NoNamedGroups);
        }

        Ok(Self { regex, group_names })
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    /// Try this pattern against an entry. A match qualifies only when at
    /// least one named group captured non-empty text; groups that did
    /// not participate map to an empty string.
    pub fn try_match(&self, entry: &str) -> Option<LogRecord> {
        let captures = self.regex.captures(entry)?;

        let mut record = LogRecord::new();
        let mut any_captured = false;
        for name in &self.group_names {
            let value = captures.name(name).map(|m| m.as_str()).unwrap_or("");
            if !value.is_empty() {
                any_captured = true;
            }
            record.insert(name.clone(), Value::String(value.to_string()));
        }

        if any_captured {
            Some(record)
        } else {
            None
        }
    }
}

/// Maps entry text to a record by trying the input's patterns in
/// configured order; the first qualifying match wins and later patterns
/// are never evaluated.
pub struct FieldExtractor {
    input: Arc<Input>,
}

impl FieldExtractor {
    pub fn new(input: Arc<Input>) -> Self {
        Self { input }
    }

    pub fn extract(&self, entry: &str) -> Option<LogRecord> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }

        for pattern in &self.input.patterns {
            if let Some(record) = pattern.try_match(entry) {
                return Some(record);
            }
        }

        let mut record = LogRecord::new();
        record.insert(
            FALLBACK_KEY.to_string(),
            Value::String(entry.to_string()),
        );
        Some(record)
    }
}
