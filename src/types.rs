use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::scale::Scale;

/// Accepts whole JSON numbers written as floats (`3.0`) for count fields.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

/// One distinct pipe length and how many pieces of it are on hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub length: f64,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub stock: u32,
}

impl InventoryItem {
    pub fn new(length: f64, stock: u32) -> Self {
        Self { length, stock }
    }
}

/// How a solution's total compares to the desired length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Exact Match")]
    Exact,
    Under,
    /// Never produced by the solver, which rejects any total above the target.
    Over,
}

impl Direction {
    pub fn from_deviation(deviation_units: i64) -> Self {
        match deviation_units.signum() {
            0 => Direction::Exact,
            -1 => Direction::Under,
            _ => Direction::Over,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Exact => "Exact Match",
            Direction::Under => "Under",
            Direction::Over => "Over",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable snapshot of one feasible combination.
///
/// Counts are keyed by the scaled integer length so that two records with
/// the same multiset of pieces compare equal regardless of how the search
/// reached them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionRecord {
    counts: BTreeMap<u64, u32>,
    total_units: u64,
    deviation_units: i64,
    scale: Scale,
}

impl SolutionRecord {
    pub(crate) fn new(
        counts: BTreeMap<u64, u32>,
        total_units: u64,
        target_units: u64,
        scale: Scale,
    ) -> Self {
        Self {
            counts,
            total_units,
            deviation_units: total_units as i64 - target_units as i64,
            scale,
        }
    }

    /// Pieces used, keyed by scaled length in ascending order.
    pub fn counts(&self) -> &BTreeMap<u64, u32> {
        &self.counts
    }

    /// `(length, count)` pairs, longest piece first.
    pub fn pieces(&self) -> impl Iterator<Item = (f64, u32)> + '_ {
        self.counts
            .iter()
            .rev()
            .map(|(&units, &count)| (self.scale.to_real(units), count))
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    pub fn deviation_units(&self) -> i64 {
        self.deviation_units
    }

    pub fn abs_deviation_units(&self) -> u64 {
        self.deviation_units.unsigned_abs()
    }

    pub fn total_length(&self) -> f64 {
        self.scale.to_real(self.total_units)
    }

    pub fn deviation(&self) -> f64 {
        self.scale.to_real_signed(self.deviation_units)
    }

    pub fn piece_count(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn direction(&self) -> Direction {
        Direction::from_deviation(self.deviation_units)
    }

    /// Order-independent `length:count|length:count` key, ascending by length.
    pub fn signature(&self) -> String {
        self.counts
            .iter()
            .map(|(units, count)| format!("{units}:{count}"))
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search tree nodes entered, including the empty root.
    pub nodes_visited: u64,
    /// Feasible non-empty combinations emitted before ranking.
    pub candidates: u64,
    /// Candidates sharing a signature with a better-ranked one, counted
    /// over all candidates before truncation to `top_n`.
    pub duplicates_dropped: u64,
}

/// Ranked, deduplicated solutions of a single search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    records: Vec<SolutionRecord>,
    stats: SearchStats,
    target_units: u64,
    scale: Scale,
}

impl ResultSet {
    pub(crate) fn new(
        records: Vec<SolutionRecord>,
        stats: SearchStats,
        target_units: u64,
        scale: Scale,
    ) -> Self {
        Self {
            records,
            stats,
            target_units,
            scale,
        }
    }

    /// Result for input the engine refuses to search.
    pub(crate) fn empty(scale: Scale) -> Self {
        Self::new(Vec::new(), SearchStats::default(), 0, scale)
    }

    pub fn records(&self) -> &[SolutionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SolutionRecord> {
        self.records
    }

    pub fn best(&self) -> Option<&SolutionRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Scaled target, or zero when the input was rejected.
    pub fn target_units(&self) -> u64 {
        self.target_units
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SolutionRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a SolutionRecord;
    type IntoIter = std::slice::Iter<'a, SolutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
