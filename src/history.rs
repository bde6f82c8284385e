//! Bounded record of recent generations, most recent first.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

use crate::generation::GenerationResult;

/// One completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: u64,
    pub input: String,
    pub output: String,
    pub inference_time_ms: u64,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct GenerationHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
    next_id: u64,
}

impl GenerationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            next_id: 1,
        }
    }

    /// Record a successful generation, evicting the oldest entry past the limit.
    pub fn record(&mut self, input: &str, result: &GenerationResult) -> &HistoryEntry {
        let entry = HistoryEntry {
            id: self.next_id,
            input: input.to_string(),
            output: result.text.clone(),
            inference_time_ms: result.inference_time_ms,
            timestamp: Local::now(),
        };
        self.next_id += 1;

        self.entries.push_front(entry);
        self.entries.truncate(self.limit);
        &self.entries[0]
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
