//! Ordering of solutions within a cell.
//!
//! A solution is *valid* for a cell when the active metric is strictly
//! positive and the filter admits it. Impact ranks descending, cost
//! ascending. Ties keep solution-id order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use nbs_common::{Cell, CellKey, RankingMode, Score, ScoreMap, SolutionId};
use serde::{Deserialize, Serialize};

/// Display-time filter over scored solutions.
///
/// Excluding a solution never requires re-scoring; it only hides the
/// solution from ranking and aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingFilter {
    /// Solutions hidden from ranking.
    pub excluded: BTreeSet<SolutionId>,
    /// Inclusive impact bounds.
    pub impact_range: Option<(f64, f64)>,
    /// Inclusive cost bounds.
    pub cost_range: Option<(f64, f64)>,
}

impl RankingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_impact_range(mut self, min: f64, max: f64) -> Self {
        self.impact_range = Some((min, max));
        self
    }

    pub fn with_cost_range(mut self, min: f64, max: f64) -> Self {
        self.cost_range = Some((min, max));
        self
    }

    pub fn exclude(&mut self, solution: SolutionId) {
        self.excluded.insert(solution);
    }

    pub fn include(&mut self, solution: &SolutionId) {
        self.excluded.remove(solution);
    }

    /// Flip a solution's inclusion. Returns whether it is now included.
    pub fn toggle_solution(&mut self, solution: SolutionId) -> bool {
        if self.excluded.remove(&solution) {
            true
        } else {
            self.excluded.insert(solution);
            false
        }
    }

    pub fn admits(&self, solution: &SolutionId, score: &Score) -> bool {
        if self.excluded.contains(solution) {
            return false;
        }
        let within = |range: Option<(f64, f64)>, value: f64| {
            range.map_or(true, |(min, max)| value >= min && value <= max)
        };
        within(self.impact_range, score.impact()) && within(self.cost_range, score.cost())
    }
}

fn compare(mode: RankingMode, a: &Score, b: &Score) -> Ordering {
    match mode {
        RankingMode::Impact => b.impact().total_cmp(&a.impact()),
        RankingMode::Cost => a.cost().total_cmp(&b.cost()),
    }
}

/// Valid solutions of a cell in rank order.
pub fn ranked_solutions<'a>(
    scores: &'a ScoreMap,
    mode: RankingMode,
    filter: &RankingFilter,
) -> Vec<(&'a SolutionId, &'a Score)> {
    let mut valid: Vec<_> = scores
        .iter()
        .filter(|(id, score)| score.metric(mode) > 0.0 && filter.admits(id, score))
        .collect();
    // Stable, so equal metrics keep id order
    valid.sort_by(|(_, a), (_, b)| compare(mode, a, b));
    valid
}

/// The solution at 1-based `rank`, or `None` past the last valid one.
pub fn nth_ranked<'a>(
    scores: &'a ScoreMap,
    mode: RankingMode,
    rank: usize,
    filter: &RankingFilter,
) -> Option<(&'a SolutionId, &'a Score)> {
    if rank == 0 {
        return None;
    }
    ranked_solutions(scores, mode, filter).into_iter().nth(rank - 1)
}

/// Number of valid solutions in a cell; unscored cells have none.
pub fn valid_count(cell: &Cell, mode: RankingMode, filter: &RankingFilter) -> usize {
    cell.scores()
        .map(|scores| {
            scores
                .iter()
                .filter(|(id, score)| score.metric(mode) > 0.0 && filter.admits(id, score))
                .count()
        })
        .unwrap_or(0)
}

/// Largest valid count across the given cells.
pub fn max_valid_rank<'a>(
    cells: impl IntoIterator<Item = &'a Cell>,
    mode: RankingMode,
    filter: &RankingFilter,
) -> usize {
    cells
        .into_iter()
        .map(|cell| valid_count(cell, mode, filter))
        .max()
        .unwrap_or(0)
}

/// Keep a requested rank within `1..=max(1, max_rank)`.
pub fn clamp_rank(rank: usize, max_rank: usize) -> usize {
    rank.clamp(1, max_rank.max(1))
}

/// The Nth-ranked solution of every scored cell that has one.
pub fn nth_ranked_by_cell<'a>(
    cells: &'a BTreeMap<CellKey, Cell>,
    mode: RankingMode,
    rank: usize,
    filter: &RankingFilter,
) -> BTreeMap<CellKey, (&'a SolutionId, &'a Score)> {
    cells
        .iter()
        .filter_map(|(key, cell)| {
            let scores = cell.scores()?;
            nth_ranked(scores, mode, rank, filter).map(|entry| (*key, entry))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbs_common::BoundingBox;

    fn scores(entries: &[(&str, f64, f64)]) -> ScoreMap {
        // (id, area, unit cost) with weight 1
        entries
            .iter()
            .map(|(id, area, cost)| (SolutionId::new(*id), Score::from_area(*area, 1.0, *cost)))
            .collect()
    }

    fn ids(ranked: &[(&SolutionId, &Score)]) -> Vec<String> {
        ranked.iter().map(|(id, _)| id.to_string()).collect()
    }

    fn sample() -> ScoreMap {
        scores(&[("A", 0.2, 100.0), ("B", 0.9, 10.0), ("C", 0.5, 50.0), ("D", 0.0, 10.0)])
    }

    #[test]
    fn test_rank_by_impact_descending() {
        let s = sample();
        let ranked = ranked_solutions(&s, RankingMode::Impact, &RankingFilter::new());
        assert_eq!(ids(&ranked), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_rank_by_cost_ascending() {
        let s = sample();
        // A: 20, B: 9, C: 25; D has zero cost and is invalid
        let ranked = ranked_solutions(&s, RankingMode::Cost, &RankingFilter::new());
        assert_eq!(ids(&ranked), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_ties_are_stable() {
        let s = scores(&[("Z", 0.5, 1.0), ("M", 0.5, 1.0), ("A", 0.5, 1.0)]);
        let ranked = ranked_solutions(&s, RankingMode::Impact, &RankingFilter::new());
        assert_eq!(ids(&ranked), vec!["A", "M", "Z"]);
    }

    #[test]
    fn test_nth_ranked_underflow() {
        let s = sample();
        let filter = RankingFilter::new();
        assert_eq!(nth_ranked(&s, RankingMode::Impact, 1, &filter).unwrap().0.as_str(), "B");
        assert_eq!(nth_ranked(&s, RankingMode::Impact, 3, &filter).unwrap().0.as_str(), "A");
        assert!(nth_ranked(&s, RankingMode::Impact, 4, &filter).is_none());
        assert!(nth_ranked(&s, RankingMode::Impact, 0, &filter).is_none());
    }

    #[test]
    fn test_rank_monotonicity() {
        let s = scores(&[
            ("A", 0.1, 7.0),
            ("B", 0.8, 3.0),
            ("C", 0.4, 90.0),
            ("D", 0.4, 1.0),
            ("E", 1.0, 0.5),
        ]);
        let filter = RankingFilter::new();

        let impacts: Vec<f64> = (1..=5)
            .filter_map(|n| nth_ranked(&s, RankingMode::Impact, n, &filter))
            .map(|(_, score)| score.impact())
            .collect();
        assert!(impacts.windows(2).all(|w| w[1] <= w[0]));

        let costs: Vec<f64> = (1..=5)
            .filter_map(|n| nth_ranked(&s, RankingMode::Cost, n, &filter))
            .map(|(_, score)| score.cost())
            .collect();
        assert!(costs.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_filter_excludes_and_ranges() {
        let s = sample();
        let mut filter = RankingFilter::new();
        filter.exclude(SolutionId::new("B"));
        let ranked = ranked_solutions(&s, RankingMode::Impact, &filter);
        assert_eq!(ids(&ranked), vec!["C", "A"]);

        assert!(filter.toggle_solution(SolutionId::new("B")));
        let filter = filter.with_impact_range(30.0, 95.0);
        let ranked = ranked_solutions(&s, RankingMode::Impact, &filter);
        assert_eq!(ids(&ranked), vec!["B", "C"]);

        let filter = RankingFilter::new().with_cost_range(0.0, 20.0);
        let ranked = ranked_solutions(&s, RankingMode::Cost, &filter);
        assert_eq!(ids(&ranked), vec!["B", "A"]);
    }

    #[test]
    fn test_max_valid_rank_and_clamp() {
        let mut a = Cell::new(CellKey::from_degrees(0.0, 0.0), BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        a.set_scores(sample());
        let mut b = Cell::new(CellKey::from_degrees(1.0, 0.0), BoundingBox::new(0.0, 1.0, 1.0, 2.0));
        b.set_scores(scores(&[("A", 1.0, 0.0)]));
        let unscored = Cell::new(CellKey::from_degrees(2.0, 0.0), BoundingBox::new(0.0, 2.0, 1.0, 3.0));

        let filter = RankingFilter::new();
        assert_eq!(max_valid_rank([&a, &b, &unscored], RankingMode::Impact, &filter), 3);
        assert_eq!(max_valid_rank([&b, &unscored], RankingMode::Cost, &filter), 0);
        assert_eq!(max_valid_rank(std::iter::empty(), RankingMode::Impact, &filter), 0);

        assert_eq!(clamp_rank(5, 3), 3);
        assert_eq!(clamp_rank(0, 3), 1);
        assert_eq!(clamp_rank(4, 0), 1);
    }
}
