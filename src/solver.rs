use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::scale::Scale;
use crate::types::{InventoryItem, ResultSet, SearchStats, SolutionRecord};

pub const DEFAULT_TOP_N: usize = 10;

/// Secondary ordering among solutions with the same absolute deviation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Fewer pieces first, then the combination using longer pieces.
    #[default]
    FewestPieces,
    /// Keep the order in which the search discovered them.
    DiscoveryOrder,
}

pub struct Solver {
    target: f64,
    inventory: Vec<InventoryItem>,
    top_n: usize,
    scale: Scale,
    tie_break: TieBreak,
}

impl Solver {
    pub fn new(target: f64, inventory: Vec<InventoryItem>) -> Self {
        Self {
            target,
            inventory,
            top_n: DEFAULT_TOP_N,
            scale: Scale::default(),
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn inventory(&self) -> &[InventoryItem] {
        &self.inventory
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Enumerates every combination that does not exceed the target and
    /// returns the best `top_n`, closest first.
    ///
    /// Input the engine cannot represent exactly (non-positive, non-finite or
    /// zero-stock values, or merged stock past `u32::MAX`) yields an empty
    /// result instead of a partial search.
    pub fn solve(&self) -> ResultSet {
        let Some(target_units) = self.scale.to_units(self.target) else {
            tracing::warn!(desired_length = self.target, "refusing to search: invalid target");
            return ResultSet::empty(self.scale);
        };
        let Some(pieces) = self.normalize_inventory() else {
            tracing::warn!(
                items = self.inventory.len(),
                "refusing to search: invalid inventory"
            );
            return ResultSet::empty(self.scale);
        };

        let mut state = SearchState::new(pieces, target_units, self.scale);
        state.search();
        debug_assert!(state.is_restored(), "stock not restored after search");

        let mut stats = SearchStats {
            nodes_visited: state.nodes_visited,
            candidates: state.candidates.len() as u64,
            duplicates_dropped: 0,
        };
        tracing::debug!(
            target_units,
            distinct_lengths = state.pieces.len(),
            nodes = stats.nodes_visited,
            candidates = stats.candidates,
            "search finished"
        );

        let records = self.rank(state.candidates, &mut stats);
        tracing::info!(
            solutions = records.len(),
            best_deviation = records.first().map(|r| r.deviation_units()),
            "ranked solutions"
        );

        ResultSet::new(records, stats, target_units, self.scale)
    }

    /// Scales every item and merges entries whose lengths coincide after
    /// rounding. Returns the pieces longest first.
    fn normalize_inventory(&self) -> Option<Vec<Piece>> {
        let mut merged: BTreeMap<u64, u32> = BTreeMap::new();
        for item in &self.inventory {
            let length = self.scale.to_units(item.length)?;
            if item.stock == 0 {
                return None;
            }
            let stock = merged.entry(length).or_insert(0);
            *stock = stock.checked_add(item.stock)?;
        }

        Some(
            merged
                .into_iter()
                .rev()
                .map(|(length, stock)| Piece { length, stock })
                .collect(),
        )
    }

    fn rank(&self, mut candidates: Vec<SolutionRecord>, stats: &mut SearchStats) -> Vec<SolutionRecord> {
        match self.tie_break {
            TieBreak::FewestPieces => candidates.sort_by(compare_fewest_pieces),
            TieBreak::DiscoveryOrder => candidates.sort_by_key(|r| r.abs_deviation_units()),
        }

        let mut seen = HashSet::new();
        let mut ranked: Vec<SolutionRecord> = candidates
            .into_iter()
            .filter(|record| seen.insert(record.signature()))
            .collect();
        stats.duplicates_dropped = stats.candidates - ranked.len() as u64;
        ranked.truncate(self.top_n);
        ranked
    }
}

fn compare_fewest_pieces(a: &SolutionRecord, b: &SolutionRecord) -> Ordering {
    a.abs_deviation_units()
        .cmp(&b.abs_deviation_units())
        .then_with(|| a.piece_count().cmp(&b.piece_count()))
        .then_with(|| b.counts().iter().rev().cmp(a.counts().iter().rev()))
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    length: u64,
    stock: u32,
}

/// One level of the depth-first search. `chosen` is the piece applied when
/// the frame was entered and must be undone when it is popped; `next` is the
/// first index still to be tried as a child.
#[derive(Debug, Clone, Copy)]
struct Frame {
    chosen: Option<usize>,
    next: usize,
}

/// Mutable search state shared by all frames. Each applied piece is undone
/// before its sibling is tried, so `remaining` equals the input stock once
/// the search returns.
struct SearchState {
    pieces: Vec<Piece>,
    remaining: Vec<u32>,
    used: Vec<u32>,
    total: u64,
    target: u64,
    scale: Scale,
    candidates: Vec<SolutionRecord>,
    nodes_visited: u64,
}

impl SearchState {
    fn new(pieces: Vec<Piece>, target: u64, scale: Scale) -> Self {
        Self {
            remaining: pieces.iter().map(|p| p.stock).collect(),
            used: vec![0; pieces.len()],
            pieces,
            total: 0,
            target,
            scale,
            candidates: Vec::new(),
            nodes_visited: 0,
        }
    }

    /// Runs the search with an explicit frame stack. A child frame may only
    /// choose pieces at or after its parent's index, which yields each
    /// multiset once instead of once per ordering.
    fn search(&mut self) {
        self.visit();
        let mut stack = vec![Frame {
            chosen: None,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            match self.next_feasible(frame.next) {
                Some(i) => {
                    frame.next = i + 1;
                    self.apply(i);
                    self.visit();
                    stack.push(Frame {
                        chosen: Some(i),
                        next: i,
                    });
                }
                None => {
                    if let Some(i) = frame.chosen {
                        self.undo(i);
                    }
                    stack.pop();
                }
            }
        }
    }

    /// First piece at or after `from` with stock left that still fits.
    fn next_feasible(&self, from: usize) -> Option<usize> {
        (from..self.pieces.len()).find(|&i| {
            self.remaining[i] > 0 && self.total + self.pieces[i].length <= self.target
        })
    }

    fn apply(&mut self, i: usize) {
        self.remaining[i] -= 1;
        self.used[i] += 1;
        self.total += self.pieces[i].length;
    }

    fn undo(&mut self, i: usize) {
        self.remaining[i] += 1;
        self.used[i] -= 1;
        self.total -= self.pieces[i].length;
    }

    /// Every non-empty node is a candidate, not only the leaves.
    fn visit(&mut self) {
        self.nodes_visited += 1;
        if self.total == 0 {
            return;
        }
        let counts: BTreeMap<u64, u32> = self
            .pieces
            .iter()
            .zip(&self.used)
            .filter(|(_, used)| **used > 0)
            .map(|(piece, used)| (piece.length, *used))
            .collect();
        self.candidates
            .push(SolutionRecord::new(counts, self.total, self.target, self.scale));
    }

    fn is_restored(&self) -> bool {
        self.total == 0
            && self.used.iter().all(|&u| u == 0)
            && self
                .pieces
                .iter()
                .zip(&self.remaining)
                .all(|(piece, &left)| piece.stock == left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(pairs: &[(u64, u32)]) -> BTreeMap<u64, u32> {
        pairs
            .iter()
            .map(|&(length, count)| (length * 1_000_000, count))
            .collect()
    }

    /// Checks the properties every result set must satisfy:
    /// 1. No total exceeds the target
    /// 2. Deviation matches total minus target
    /// 3. Absolute deviation is non-decreasing
    /// 4. No two records share a signature
    fn assert_result_valid(result: &ResultSet, top_n: usize) {
        assert!(result.len() <= top_n);
        let target = result.target_units();
        let mut signatures = HashSet::new();
        for (i, r) in result.iter().enumerate() {
            assert!(
                r.total_units() <= target,
                "record {i} total {} exceeds target {target}",
                r.total_units()
            );
            assert_eq!(r.deviation_units(), r.total_units() as i64 - target as i64);
            assert!(r.total_units() > 0);
            assert!(signatures.insert(r.signature()), "duplicate record {i}");
        }
        for pair in result.records().windows(2) {
            assert!(pair[0].abs_deviation_units() <= pair[1].abs_deviation_units());
        }
    }

    #[test]
    fn test_exact_fit_with_intermediate() {
        let result = Solver::new(10.0, vec![InventoryItem::new(5.0, 2)]).solve();
        assert_result_valid(&result, DEFAULT_TOP_N);
        assert_eq!(result.len(), 2);

        let best = result.best().unwrap();
        assert_eq!(best.counts(), &units(&[(5, 2)]));
        assert_eq!(best.total_units(), 10_000_000);
        assert_eq!(best.deviation_units(), 0);

        let second = &result.records()[1];
        assert_eq!(second.counts(), &units(&[(5, 1)]));
        assert_eq!(second.deviation_units(), -5_000_000);
    }

    #[test]
    fn test_excludes_combination_over_target() {
        let result = Solver::new(
            7.0,
            vec![InventoryItem::new(5.0, 1), InventoryItem::new(3.0, 1)],
        )
        .solve();
        assert_result_valid(&result, DEFAULT_TOP_N);
        assert_eq!(result.len(), 2);
        assert_eq!(result.records()[0].counts(), &units(&[(5, 1)]));
        assert_eq!(result.records()[0].deviation_units(), -2_000_000);
        assert_eq!(result.records()[1].counts(), &units(&[(3, 1)]));
        assert_eq!(result.records()[1].deviation_units(), -4_000_000);
    }

    #[test]
    fn test_no_piece_fits() {
        let result = Solver::new(1.0, vec![InventoryItem::new(5.0, 10)]).solve();
        assert!(result.is_empty());
        assert_eq!(result.stats().nodes_visited, 1);
    }

    #[test]
    fn test_empty_inventory() {
        let result = Solver::new(10.0, vec![]).solve();
        assert!(result.is_empty());
    }

    #[test]
    fn test_sub_unit_deviation() {
        let result = Solver::new(6.000001, vec![InventoryItem::new(3.0, 2)]).solve();
        assert_eq!(result.target_units(), 6_000_001);
        let best = result.best().unwrap();
        assert_eq!(best.total_units(), 6_000_000);
        assert_eq!(best.deviation_units(), -1);
        assert_eq!(best.scale().format_signed(best.deviation_units()), "-0.000001");
    }

    #[test]
    fn test_invalid_input_yields_empty() {
        let items = vec![InventoryItem::new(2.0, 3)];
        assert!(Solver::new(0.0, items.clone()).solve().is_empty());
        assert!(Solver::new(-4.0, items.clone()).solve().is_empty());
        assert!(Solver::new(f64::NAN, items.clone()).solve().is_empty());
        assert!(Solver::new(f64::INFINITY, items).solve().is_empty());

        let bad_length = vec![InventoryItem::new(2.0, 3), InventoryItem::new(-1.0, 2)];
        assert!(Solver::new(10.0, bad_length).solve().is_empty());

        let bad_stock = vec![InventoryItem::new(2.0, 0)];
        assert!(Solver::new(10.0, bad_stock).solve().is_empty());
    }

    #[test]
    fn test_respects_stock_limits() {
        // Only three 2s available, so 8 cannot be reached with 2s alone
        let result = Solver::new(8.0, vec![InventoryItem::new(2.0, 3)]).solve();
        assert_result_valid(&result, DEFAULT_TOP_N);
        assert_eq!(result.best().unwrap().counts(), &units(&[(2, 3)]));
        assert_eq!(result.best().unwrap().deviation_units(), -2_000_000);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_top_n_truncates() {
        let inventory = vec![
            InventoryItem::new(7.0, 2),
            InventoryItem::new(5.0, 3),
            InventoryItem::new(3.0, 4),
            InventoryItem::new(2.0, 5),
        ];
        let result = Solver::new(20.0, inventory.clone()).with_top_n(5).solve();
        assert_result_valid(&result, 5);
        assert_eq!(result.len(), 5);
        assert!(result.iter().all(|r| r.deviation_units() == 0));

        assert!(Solver::new(20.0, inventory).with_top_n(0).solve().is_empty());
    }

    #[test]
    fn test_equal_lengths_are_merged() {
        let result = Solver::new(
            6.0,
            vec![InventoryItem::new(2.0, 1), InventoryItem::new(2.0000001, 2)],
        )
        .solve();
        assert_result_valid(&result, DEFAULT_TOP_N);
        // Both entries round to 2.000000 and pool their stock
        assert_eq!(result.best().unwrap().counts(), &units(&[(2, 3)]));
        assert_eq!(result.len(), 3);
        assert_eq!(result.stats().duplicates_dropped, 0);
    }

    #[test]
    fn test_merged_stock_overflow_yields_empty() {
        let inventory = vec![
            InventoryItem::new(2.0, u32::MAX),
            InventoryItem::new(2.0000001, 1),
        ];
        let result = Solver::new(4.0, inventory).solve();
        assert!(result.is_empty());
        assert_eq!(result.stats().nodes_visited, 0);
    }

    #[test]
    fn test_duplicate_count_does_not_depend_on_top_n() {
        let inventory = vec![InventoryItem::new(3.0, 2), InventoryItem::new(2.0, 3)];
        let all = Solver::new(9.0, inventory.clone()).solve();
        let one = Solver::new(9.0, inventory).with_top_n(1).solve();
        assert_eq!(all.stats().duplicates_dropped, 0);
        assert_eq!(all.stats(), one.stats());
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_fewest_pieces_breaks_ties() {
        // 6 = 6 = 3+3 = 2+2+2; all exact
        let inventory = vec![
            InventoryItem::new(2.0, 3),
            InventoryItem::new(3.0, 2),
            InventoryItem::new(6.0, 1),
        ];
        let result = Solver::new(6.0, inventory.clone()).solve();
        assert_result_valid(&result, DEFAULT_TOP_N);
        let exact: Vec<_> = result
            .iter()
            .filter(|r| r.deviation_units() == 0)
            .map(|r| r.piece_count())
            .collect();
        assert_eq!(exact, vec![1, 2, 3]);

        let discovery = Solver::new(6.0, inventory)
            .with_tie_break(TieBreak::DiscoveryOrder)
            .solve();
        assert_result_valid(&discovery, DEFAULT_TOP_N);
        // Longest pieces are explored first, so the single 6 is found first too
        assert_eq!(discovery.best().unwrap().counts(), &units(&[(6, 1)]));
        let exact: Vec<_> = discovery
            .iter()
            .filter(|r| r.deviation_units() == 0)
            .map(|r| r.piece_count())
            .collect();
        assert_eq!(exact, vec![1, 2, 3]);
    }

    #[test]
    fn test_equal_count_tie_prefers_longer_pieces() {
        // 4+1 and 3+2 both make 5 with two pieces
        let inventory = vec![
            InventoryItem::new(1.0, 1),
            InventoryItem::new(2.0, 1),
            InventoryItem::new(3.0, 1),
            InventoryItem::new(4.0, 1),
        ];
        let result = Solver::new(5.0, inventory).solve();
        assert_eq!(result.records()[0].counts(), &units(&[(4, 1), (1, 1)]));
        assert_eq!(result.records()[1].counts(), &units(&[(3, 1), (2, 1)]));
    }

    #[test]
    fn test_state_restored_after_search() {
        let pieces = vec![
            Piece { length: 5, stock: 2 },
            Piece { length: 3, stock: 3 },
            Piece { length: 1, stock: 4 },
        ];
        let mut state = SearchState::new(pieces, 12, Scale::new(0).unwrap());
        state.search();
        assert!(state.is_restored());
        assert_eq!(state.remaining, vec![2, 3, 4]);
        assert!(!state.candidates.is_empty());
    }

    #[test]
    fn test_enumerates_each_multiset_once() {
        let pieces = vec![Piece { length: 2, stock: 2 }, Piece { length: 1, stock: 2 }];
        let mut state = SearchState::new(pieces, 100, Scale::new(0).unwrap());
        state.search();
        // (2 choices of 2s + 1) * (2 choices of 1s + 1) - empty
        assert_eq!(state.candidates.len(), 8);
        let unique: HashSet<_> = state.candidates.iter().map(|r| r.signature()).collect();
        assert_eq!(unique.len(), 8);
        assert_eq!(state.nodes_visited, 9);
    }

    #[test]
    fn test_solve_is_idempotent() {
        let inventory = vec![
            InventoryItem::new(4.25, 3),
            InventoryItem::new(2.5, 4),
            InventoryItem::new(1.125, 6),
        ];
        let solver = Solver::new(13.4, inventory.clone()).with_top_n(7);
        let first = solver.solve();
        let second = solver.solve();
        assert_eq!(first, second);
        assert_eq!(solver.inventory(), inventory.as_slice());
    }
}
