// SPDX-License-Identifier: Apache-2.0

//! Configuration loading and compilation.
//!
//! The YAML document is read once at startup and compiled into immutable
//! [`Input`] values. All regular expressions are compiled here, exactly
//! once; every task sees the same shared, read-only configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::pipeline::extract::Pattern;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_FLUSH_INTERVAL_SECS: f64 = 5.0;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
}

/// One configured log source, as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: TransportKind,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub multiline: MultilineConfig,
    #[serde(default)]
    pub parsers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Pipe,
    Socket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MultilineConfig {
    pub enabled: bool,
    pub first_line: String,
    /// Seconds before a partially built entry is flushed.
    pub flush_interval: Option<f64>,
}

impl Config {
    /// Read and parse the configuration file. Any failure here is fatal
    /// to the process.
    pub fn load(path: &Path) -> Result<Config> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        if config.inputs.is_empty() {
            warn!(path = %path.display(), "No inputs configured");
        }
        Ok(config)
    }

    /// Compile every input into its immutable runtime form.
    pub fn compile(&self) -> Result<Vec<Arc<Input>>> {
        self.inputs
            .iter()
            .map(|input| input.compile().map(Arc::new))
            .collect()
    }
}

impl InputConfig {
    pub fn compile(&self) -> Result<Input> {
        let multiline = if self.multiline.enabled {
            if self.multiline.first_line.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}: multiline.first_line must be set when multiline is enabled",
                    self.path.display()
                )));
            }
            let start = Regex::new(&self.multiline.first_line).map_err(|e| {
                ConfigError::Invalid(format!(
                    "{}: invalid multiline.first_line pattern: {}",
                    self.path.display(),
                    e
                ))
            })?;
            let secs = self
                .multiline
                .flush_interval
                .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECS);
            if !(secs > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{}: multiline.flush_interval must be positive",
                    self.path.display()
                )));
            }
            Some(Multiline {
                start,
                flush_interval: Duration::from_secs_f64(secs),
            })
        } else {
            None
        };

        // A pattern that fails to compile is skipped for the remainder of
        // the run; the remaining patterns keep their configured order.
        let mut patterns = Vec::with_capacity(self.parsers.len());
        for parser in &self.parsers {
            match Pattern::new(parser) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        pattern = %parser,
                        "Skipping parser pattern: {}", e
                    );
                }
            }
        }

        let tags = self
            .tags
            .iter()
            .map(|t| Tag {
                name: t.name.clone(),
                value: TagValue::parse(&t.value),
            })
            .collect();

        Ok(Input {
            path: self.path.clone(),
            kind: self.kind,
            tags,
            multiline,
            patterns,
        })
    }
}

/// Compiled, immutable form of an input, shared read-only by all tasks
/// serving that source.
#[derive(Debug)]
pub struct Input {
    pub path: PathBuf,
    pub kind: TransportKind,
    pub tags: Vec<Tag>,
    pub multiline: Option<Multiline>,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
pub struct Multiline {
    /// Pattern marking the first line of a new entry.
    pub start: Regex,
    pub flush_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub value: TagValue,
}

/// A tag value is either a literal or a reference to an environment
/// variable, marked by a leading `$` in the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Literal(String),
    Env(String),
}

impl TagValue {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('$') {
            Some(var) => TagValue::Env(var.to_string()),
            None => TagValue::Literal(raw.to_string()),
        }
    }

    /// Resolve the value against the current process environment. Env
    /// references are never cached; an unset variable yields an empty
    /// string.
    pub fn resolve(&self) -> String {
        match self {
            TagValue::Literal(v) => v.clone(),
            TagValue::Env(var) => std::env::var(var).unwrap_or_default(),
        }
    }
}
