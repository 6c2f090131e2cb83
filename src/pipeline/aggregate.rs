// SPDX-License-Identifier: Apache-2.0

//! Multi-line entry reassembly.
//!
//! The aggregator is a synchronous state machine owned by exactly one
//! connection task; the async read loop drives it with explicit `now`
//! instants so it stays trivially testable.

use std::time::Instant;

use crate::config::Multiline;

/// Accumulates physical lines into complete log entries.
///
/// In single-line mode every pushed line is returned immediately as an
/// entry. In multi-line mode lines accumulate in the pending buffer
/// until a new start line, a time-based flush, or end of stream
/// completes the entry.
pub struct LineAggregator {
    multiline: Option<Multiline>,
    buffer: String,
    last_flush: Instant,
}

impl LineAggregator {
    pub fn new(multiline: Option<Multiline>) -> Self {
        Self {
            multiline,
            buffer: String::new(),
            last_flush: Instant::now(),
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline.is_some()
    }

    /// Flush the pending buffer if it has been held past the configured
    /// flush interval. Called before processing further input and on
    /// read-idle timeouts, so a sparse writer's partial entry is not
    /// held indefinitely.
    pub fn idle_flush(&mut self, now: Instant) -> Option<String> {
        let rule = self.multiline.as_ref()?;
        if self.buffer.is_empty() || now.duration_since(self.last_flush) <= rule.flush_interval {
            return None;
        }
        self.last_flush = now;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Feed one line; returns a completed entry when the line finishes
    /// one.
    pub fn push(&mut self, line: &str, now: Instant) -> Option<String> {
        let Some(rule) = &self.multiline else {
            return Some(line.to_string());
        };

        if rule.start.is_match(line) {
            let completed = if self.buffer.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.buffer))
            };
            self.buffer.push_str(line);
            self.last_flush = now;
            completed
        } else {
            if !self.buffer.is_empty() {
                self.buffer.push(' ');
            }
            self.buffer.push_str(line);
            None
        }
    }

    /// Flush whatever is pending. Called at end of stream so a closing
    /// writer's trailing entry is not silently dropped.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.last_flush = Instant::now();
        Some(std::mem::take(&mut self.buffer))
    }
}
