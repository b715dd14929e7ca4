//! Summaries over the selected cells.

use std::collections::BTreeMap;

use nbs_common::{Cell, CellKey, ConfigSnapshot, CriterionId, RankingMode, SolutionId};
use raster::RasterSet;
use serde::{Deserialize, Serialize};

use crate::ranking::{nth_ranked, RankingFilter};
use crate::selection::Selection;

/// Running totals for one solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SolutionAggregate {
    pub impact: f64,
    pub cost: f64,
    pub count: usize,
}

impl SolutionAggregate {
    fn add(&mut self, impact: f64, cost: f64) {
        self.impact += impact;
        self.cost += cost;
        self.count += 1;
    }
}

/// Totals of the Nth-ranked solution over the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionAggregate {
    pub per_solution: BTreeMap<SolutionId, SolutionAggregate>,
    /// Sum over every contributing cell.
    pub overall: SolutionAggregate,
}

impl SelectionAggregate {
    pub fn get(&self, solution: &SolutionId) -> Option<&SolutionAggregate> {
        self.per_solution.get(solution)
    }

    pub fn is_empty(&self) -> bool {
        self.overall.count == 0
    }

    /// Solutions ordered by the mode's total: impact descending, cost ascending.
    pub fn ranked(&self, mode: RankingMode) -> Vec<(&SolutionId, &SolutionAggregate)> {
        let mut rows: Vec<_> = self.per_solution.iter().collect();
        rows.sort_by(|(_, a), (_, b)| match mode {
            RankingMode::Impact => b.impact.total_cmp(&a.impact),
            RankingMode::Cost => a.cost.total_cmp(&b.cost),
        });
        rows
    }
}

/// Sum the Nth-ranked solution of each selected, scored cell.
///
/// Cells without an Nth valid solution contribute nothing.
pub fn aggregate_selection(
    cells: &BTreeMap<CellKey, Cell>,
    selection: &Selection,
    mode: RankingMode,
    rank: usize,
    filter: &RankingFilter,
) -> SelectionAggregate {
    let mut aggregate = SelectionAggregate::default();

    for key in selection.iter() {
        let Some(scores) = cells.get(key).and_then(Cell::scores) else {
            continue;
        };
        if let Some((solution, score)) = nth_ranked(scores, mode, rank, filter) {
            aggregate
                .per_solution
                .entry(solution.clone())
                .or_default()
                .add(score.impact(), score.cost());
            aggregate.overall.add(score.impact(), score.cost());
        }
    }

    aggregate
}

/// Column a [`SolutionTotals`] table can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalsColumn {
    Solution,
    Impact,
    Cost,
    Cells,
}

/// One row of [`SolutionTotals`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionTotal {
    pub solution: SolutionId,
    pub impact: f64,
    pub cost: f64,
    /// Selected cells with a positive area for this solution.
    pub cells: usize,
}

/// Per-solution sums over every selected scored cell, regardless of rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SolutionTotals {
    rows: Vec<SolutionTotal>,
}

impl SolutionTotals {
    pub fn rows(&self) -> &[SolutionTotal] {
        &self.rows
    }

    pub fn get(&self, solution: &SolutionId) -> Option<&SolutionTotal> {
        self.rows.iter().find(|row| &row.solution == solution)
    }

    /// Rows ordered by `column`; ties keep solution order.
    pub fn sorted(&self, column: TotalsColumn, ascending: bool) -> Vec<&SolutionTotal> {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            let ordering = match column {
                TotalsColumn::Solution => a.solution.cmp(&b.solution),
                TotalsColumn::Impact => a.impact.total_cmp(&b.impact),
                TotalsColumn::Cost => a.cost.total_cmp(&b.cost),
                TotalsColumn::Cells => a.cells.cmp(&b.cells),
            };
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        rows
    }
}

/// Sum impact and cost per configured solution over the selection.
pub fn solution_totals<'a>(
    cells: &BTreeMap<CellKey, Cell>,
    selection: &Selection,
    solutions: impl IntoIterator<Item = &'a SolutionId>,
) -> SolutionTotals {
    let mut rows: Vec<SolutionTotal> = solutions
        .into_iter()
        .map(|solution| SolutionTotal {
            solution: solution.clone(),
            impact: 0.0,
            cost: 0.0,
            cells: 0,
        })
        .collect();

    for key in selection.iter() {
        let Some(scores) = cells.get(key).and_then(Cell::scores) else {
            continue;
        };
        for row in rows.iter_mut() {
            if let Some(score) = scores.get(&row.solution) {
                row.impact += score.impact();
                row.cost += score.cost();
                if score.area() > 0.0 {
                    row.cells += 1;
                }
            }
        }
    }

    SolutionTotals { rows }
}

/// Inclusive min/max of impact and cost, for range-filter bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreRanges {
    pub impact: (f64, f64),
    pub cost: (f64, f64),
}

#[derive(Default)]
struct Extremes(Option<(f64, f64)>);

impl Extremes {
    fn add(&mut self, value: f64) {
        self.0 = Some(match self.0 {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    fn or_default_range(&self) -> (f64, f64) {
        self.0.unwrap_or((0.0, 100.0))
    }
}

/// Ranges over every score in the selected cells.
///
/// With nothing selected, the ranges come from the per-solution totals.
/// A range with no values is `(0, 100)`.
pub fn score_ranges(
    cells: &BTreeMap<CellKey, Cell>,
    selection: &Selection,
    totals: &SolutionTotals,
) -> ScoreRanges {
    let mut impact = Extremes::default();
    let mut cost = Extremes::default();

    if selection.is_empty() {
        for row in totals.rows() {
            impact.add(row.impact);
            cost.add(row.cost);
        }
    } else {
        for key in selection.iter() {
            let Some(scores) = cells.get(key).and_then(Cell::scores) else {
                continue;
            };
            for score in scores.values() {
                impact.add(score.impact());
                cost.add(score.cost());
            }
        }
    }

    ScoreRanges {
        impact: impact.or_default_range(),
        cost: cost.or_default_range(),
    }
}

/// Criterion presence over the cells that count toward the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriteriaPresence {
    /// Cells with a positive sample, per registered criterion.
    pub per_criterion: BTreeMap<CriterionId, usize>,
    /// Cells where every criterion of the ranked solution is present.
    pub per_solution: BTreeMap<SolutionId, usize>,
}

/// Count criterion presence at each selected cell that has an Nth-ranked
/// solution.
///
/// Presence is what the cell recorded when it was scored, so selected
/// cells outside the current raster windows still count.
pub fn criteria_presence(
    cells: &BTreeMap<CellKey, Cell>,
    selection: &Selection,
    mode: RankingMode,
    rank: usize,
    filter: &RankingFilter,
    config: &ConfigSnapshot,
    rasters: &RasterSet,
) -> CriteriaPresence {
    let mut presence = CriteriaPresence::default();

    for key in selection.iter() {
        let Some(cell) = cells.get(key) else {
            continue;
        };
        let Some(scores) = cell.scores() else {
            continue;
        };
        let Some((solution, _)) = nth_ranked(scores, mode, rank, filter) else {
            continue;
        };
        let present = |criterion: &CriterionId| cell.present_criteria().contains(criterion);

        for raster in rasters.iter() {
            let count = presence
                .per_criterion
                .entry(raster.criterion().clone())
                .or_default();
            if present(raster.criterion()) {
                *count += 1;
            }
        }

        let all_present = config
            .solution(solution)
            .map_or(false, |s| s.criteria().iter().all(present));
        let count = presence.per_solution.entry(solution.clone()).or_default();
        if all_present {
            *count += 1;
        }
    }

    presence
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbs_common::{BoundingBox, ConfigDocument, ConfigDocuments, Score, ScoreMap};
    use raster::{CriterionRaster, RasterMetadata};
    use test_utils::config as fixture;

    fn cell(lat: f64, scores: &[(&str, f64, f64)]) -> Cell {
        let key = CellKey::from_degrees(lat, 0.0);
        let mut cell = Cell::new(key, BoundingBox::new(0.0, lat, 1.0, lat + 1.0));
        let map: ScoreMap = scores
            .iter()
            .map(|(id, area, weight)| (SolutionId::new(*id), Score::from_area(*area, *weight, 1000.0)))
            .collect();
        cell.set_scores(map);
        cell
    }

    fn cells(list: Vec<Cell>) -> BTreeMap<CellKey, Cell> {
        list.into_iter().map(|c| (c.key(), c)).collect()
    }

    fn select(cells: &BTreeMap<CellKey, Cell>) -> Selection {
        cells.keys().copied().collect()
    }

    #[test]
    fn test_two_wetland_cells_aggregate() {
        // Impacts 50 and 30
        let cells = cells(vec![
            cell(0.0, &[("Wetland", 1.0, 0.5)]),
            cell(1.0, &[("Wetland", 0.6, 0.5)]),
        ]);
        let agg = aggregate_selection(
            &cells,
            &select(&cells),
            RankingMode::Impact,
            1,
            &RankingFilter::new(),
        );

        let wetland = agg.get(&SolutionId::new("Wetland")).unwrap();
        assert!((wetland.impact - 80.0).abs() < 1e-9);
        assert_eq!(wetland.count, 2);
        assert_eq!(agg.overall.count, 2);
    }

    #[test]
    fn test_rank_underflow_contributes_nothing() {
        let cells = cells(vec![
            cell(0.0, &[("Wetland", 1.0, 0.5), ("Woodland", 0.5, 0.2)]),
            cell(1.0, &[("Wetland", 1.0, 0.5)]),
        ]);
        let agg = aggregate_selection(
            &cells,
            &select(&cells),
            RankingMode::Impact,
            2,
            &RankingFilter::new(),
        );
        assert_eq!(agg.overall.count, 1);
        assert_eq!(agg.get(&SolutionId::new("Woodland")).unwrap().count, 1);
        assert!(agg.get(&SolutionId::new("Wetland")).is_none());
    }

    #[test]
    fn test_unselected_and_unscored_cells_ignored() {
        let mut all = cells(vec![cell(0.0, &[("Wetland", 1.0, 0.5)])]);
        let unscored = CellKey::from_degrees(5.0, 0.0);
        all.insert(unscored, Cell::new(unscored, BoundingBox::new(0.0, 5.0, 1.0, 6.0)));

        let selection: Selection = [unscored, CellKey::from_degrees(9.0, 9.0)].into_iter().collect();
        let agg = aggregate_selection(&all, &selection, RankingMode::Impact, 1, &RankingFilter::new());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_aggregate_ranked_by_mode() {
        let cells = cells(vec![
            cell(0.0, &[("Wetland", 1.0, 0.5)]),
            cell(1.0, &[("Woodland", 0.2, 0.9)]),
        ]);
        let agg = aggregate_selection(
            &cells,
            &select(&cells),
            RankingMode::Impact,
            1,
            &RankingFilter::new(),
        );
        let by_impact: Vec<_> = agg.ranked(RankingMode::Impact).into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(by_impact, vec!["Wetland", "Woodland"]);
        let by_cost: Vec<_> = agg.ranked(RankingMode::Cost).into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(by_cost, vec!["Woodland", "Wetland"]);
    }

    #[test]
    fn test_solution_totals_ignore_rank() {
        let cells = cells(vec![
            cell(0.0, &[("Wetland", 1.0, 0.5), ("Woodland", 0.5, 0.2)]),
            cell(1.0, &[("Wetland", 0.0, 0.5), ("Woodland", 1.0, 0.2)]),
        ]);
        let ids = [SolutionId::new("Wetland"), SolutionId::new("Woodland"), SolutionId::new("Meadow")];
        let totals = solution_totals(&cells, &select(&cells), ids.iter());

        let woodland = totals.get(&SolutionId::new("Woodland")).unwrap();
        assert!((woodland.impact - 30.0).abs() < 1e-9);
        assert_eq!(woodland.cost, 1500.0);
        assert_eq!(woodland.cells, 2);
        assert_eq!(totals.get(&SolutionId::new("Wetland")).unwrap().cells, 1);
        assert_eq!(totals.get(&SolutionId::new("Meadow")).unwrap().impact, 0.0);

        let by_cost: Vec<_> = totals
            .sorted(TotalsColumn::Cost, false)
            .into_iter()
            .map(|row| row.solution.as_str())
            .collect();
        assert_eq!(by_cost, vec!["Woodland", "Wetland", "Meadow"]);

        let by_name: Vec<_> = totals
            .sorted(TotalsColumn::Solution, true)
            .into_iter()
            .map(|row| row.solution.as_str())
            .collect();
        assert_eq!(by_name, vec!["Meadow", "Wetland", "Woodland"]);
    }

    #[test]
    fn test_score_ranges() {
        let cells = cells(vec![
            cell(0.0, &[("Wetland", 1.0, 0.5)]),
            cell(1.0, &[("Wetland", 0.2, 0.5)]),
        ]);
        let selection = select(&cells);
        let totals = solution_totals(&cells, &selection, [SolutionId::new("Wetland")].iter());

        let ranges = score_ranges(&cells, &selection, &totals);
        assert!((ranges.impact.0 - 10.0).abs() < 1e-9);
        assert_eq!(ranges.impact.1, 50.0);
        assert_eq!(ranges.cost, (200.0, 1000.0));

        // Nothing selected: fall back to totals
        let ranges = score_ranges(&cells, &Selection::new(), &totals);
        assert_eq!(ranges.impact, (totals.rows()[0].impact, totals.rows()[0].impact));

        // Nothing at all
        let ranges = score_ranges(&cells, &Selection::new(), &SolutionTotals::default());
        assert_eq!(ranges.impact, (0.0, 100.0));
        assert_eq!(ranges.cost, (0.0, 100.0));
    }

    #[test]
    fn test_presence_uses_recorded_criteria() {
        let mut docs = ConfigDocuments::default();
        docs.set_document(ConfigDocument::SolutionCriteria, fixture::WETLAND_CRITERIA.as_bytes()).unwrap();
        docs.set_document(ConfigDocument::ChallengeCategories, fixture::WETLAND_CATEGORIES.as_bytes()).unwrap();
        docs.set_document(ConfigDocument::SolutionCosts, fixture::WETLAND_COSTS.as_bytes()).unwrap();
        let config = ConfigSnapshot::from_documents(docs).unwrap();

        // The raster has no window loaded at the cell, as for an off-screen
        // selected cell
        let mut rasters = RasterSet::new();
        rasters.insert(CriterionRaster::new(
            CriterionId::new("wet_soil"),
            RasterMetadata::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, 1),
        ));

        let mut present = cell(40.0, &[("Wetland", 1.0, 0.5)]);
        present.set_present_criteria([CriterionId::new("wet_soil")].into_iter().collect());
        let absent = cell(41.0, &[("Wetland", 0.5, 0.5)]);
        let cells = cells(vec![present, absent]);

        let presence = criteria_presence(
            &cells,
            &select(&cells),
            RankingMode::Impact,
            1,
            &RankingFilter::new(),
            &config,
            &rasters,
        );
        assert_eq!(presence.per_criterion[&CriterionId::new("wet_soil")], 1);
        assert_eq!(presence.per_solution[&SolutionId::new("Wetland")], 1);
    }
}
