use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scale::Scale;
use crate::types::{Direction, InventoryItem, ResultSet};

/// Older entries are evicted once the log holds this many.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeSnapshot {
    pub length: String,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeCount {
    pub pipe_length: String,
    pub count: u32,
}

/// A solution frozen into display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSnapshot {
    pub solution_number: usize,
    pub pipe_counts: Vec<PipeCount>,
    pub total_length: String,
    pub deviation_value: String,
    pub deviation_direction: Direction,
}

impl SolutionSnapshot {
    pub fn from_result(result: &ResultSet) -> Vec<Self> {
        result
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let scale = record.scale();
                SolutionSnapshot {
                    solution_number: i + 1,
                    pipe_counts: record
                        .counts()
                        .iter()
                        .rev()
                        .map(|(&units, &count)| PipeCount {
                            pipe_length: scale.format_units(units),
                            count,
                        })
                        .collect(),
                    total_length: scale.format_units(record.total_units()),
                    deviation_value: scale.format_signed(record.deviation_units()),
                    deviation_direction: record.direction(),
                }
            })
            .collect()
    }
}

/// One calculation: its input and its ranked output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub desired_length: String,
    pub available_pipes: Vec<PipeSnapshot>,
    pub solutions: Vec<SolutionSnapshot>,
}

impl HistoryEntry {
    pub fn new(scale: Scale, target: f64, inventory: &[InventoryItem], result: &ResultSet) -> Self {
        Self::at(Utc::now(), scale, target, inventory, result)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        scale: Scale,
        target: f64,
        inventory: &[InventoryItem],
        result: &ResultSet,
    ) -> Self {
        Self {
            timestamp,
            desired_length: scale.format_real(target),
            available_pipes: inventory
                .iter()
                .map(|item| PipeSnapshot {
                    length: scale.format_real(item.length),
                    number: item.stock,
                })
                .collect(),
            solutions: SolutionSnapshot::from_result(result),
        }
    }
}

/// Newest-first log of past calculations. Entries are never edited; the
/// oldest one is dropped when the log is full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a saved log. A missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let mut history: History = serde_json::from_str(&data)?;
        history.entries.truncate(HISTORY_CAPACITY);
        tracing::debug!(path = %path.display(), entries = history.len(), "loaded history");
        Ok(history)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        tracing::debug!(path = %path.display(), entries = self.len(), "saved history");
        Ok(())
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        if self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_back();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
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

pub fn render_history(history: &History) -> String {
    if history.is_empty() {
        return "No history available.\n".to_string();
    }

    let mut out = String::new();
    for entry in history.entries() {
        out.push_str(&format!(
            "Timestamp: {}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!("Desired Length: {}\n", entry.desired_length));
        let pipes: Vec<String> = entry
            .available_pipes
            .iter()
            .map(|p| format!("{} x {}", p.length, p.number))
            .collect();
        out.push_str(&format!("Available Pipes: {}\n", pipes.join(", ")));
        out.push_str("Solutions:\n");
        for sol in &entry.solutions {
            let pieces: Vec<String> = sol
                .pipe_counts
                .iter()
                .map(|p| format!("{} x {}", p.pipe_length, p.count))
                .collect();
            out.push_str(&format!(
                "  Solution {}: Pipes - {}, Total Length - {}, Deviation - {} ({})\n",
                sol.solution_number,
                pieces.join(", "),
                sol.total_length,
                sol.deviation_value.trim_start_matches('-'),
                sol.deviation_direction
            ));
        }
        out.push('\n');
    }
    out
}
