//! Solution, challenge category and score records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CriterionId, NbsError, NbsResult, SolutionId};

/// Impact/cost/area of one solution in one cell.
///
/// Only constructible through [`Score::from_area`], which keeps `area` in
/// `[0, 1]` and `impact`/`cost` non-negative and zero when `area` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Score {
    impact: f64,
    cost: f64,
    area: f64,
}

impl Score {
    /// Derive a score from an overlap fraction, a category weight and a
    /// unit cost. Non-finite or negative inputs count as zero.
    pub fn from_area(area: f64, weight: f64, unit_cost: f64) -> Self {
        let area = non_negative(area).min(1.0);
        let weight = non_negative(weight);
        let unit_cost = non_negative(unit_cost);

        Self {
            impact: area * weight * 100.0,
            cost: area * unit_cost,
            area,
        }
    }

    /// The all-zero score.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn impact(&self) -> f64 {
        self.impact
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// The metric a ranking mode orders by.
    pub fn metric(&self, mode: RankingMode) -> f64 {
        match mode {
            RankingMode::Impact => self.impact,
            RankingMode::Cost => self.cost,
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// A candidate nature-based intervention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    id: SolutionId,
    criteria: Vec<CriterionId>,
    unit_cost: f64,
}

impl Solution {
    /// Create a solution. Duplicate criteria are dropped, keeping the first
    /// occurrence; the unit cost must be finite and non-negative.
    pub fn new(id: SolutionId, criteria: Vec<CriterionId>, unit_cost: f64) -> NbsResult<Self> {
        if !unit_cost.is_finite() || unit_cost < 0.0 {
            return Err(NbsError::InvalidConfig(format!(
                "unit cost for '{}' must be a non-negative number, got {}",
                id, unit_cost
            )));
        }

        let mut unique = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            if !unique.contains(&criterion) {
                unique.push(criterion);
            }
        }

        Ok(Self {
            id,
            criteria: unique,
            unit_cost,
        })
    }

    pub fn id(&self) -> &SolutionId {
        &self.id
    }

    pub fn criteria(&self) -> &[CriterionId] {
        &self.criteria
    }

    pub fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    /// Solutions without criteria are never scored.
    pub fn is_scorable(&self) -> bool {
        !self.criteria.is_empty()
    }
}

/// A named weighting profile mapping solutions to impact weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeCategory {
    name: String,
    weights: BTreeMap<SolutionId, f64>,
}

impl ChallengeCategory {
    /// Create a category; every weight must be finite and non-negative.
    pub fn new(name: impl Into<String>, weights: BTreeMap<SolutionId, f64>) -> NbsResult<Self> {
        let name = name.into();
        if let Some((solution, weight)) = weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(NbsError::InvalidConfig(format!(
                "weight for '{}' in category '{}' must be a non-negative number, got {}",
                solution, name, weight
            )));
        }
        Ok(Self { name, weights })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weight for a solution, 0 when the category has no entry.
    pub fn weight(&self, solution: &SolutionId) -> f64 {
        self.weights.get(solution).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &BTreeMap<SolutionId, f64> {
        &self.weights
    }
}

/// Which metric orders solutions within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Highest impact first.
    #[default]
    Impact,
    /// Lowest cost first.
    Cost,
}

impl RankingMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Impact => Self::Cost,
            Self::Cost => Self::Impact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impact => "impact",
            Self::Cost => "cost",
        }
    }
}

impl std::fmt::Display for RankingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RankingMode {
    type Err = NbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "impact" => Ok(Self::Impact),
            "cost" => Ok(Self::Cost),
            other => Err(NbsError::invalid_parameter(
                "ranking",
                format!("expected 'impact' or 'cost', got '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_formulas() {
        let score = Score::from_area(1.0, 0.5, 1000.0);
        assert!((score.impact() - 50.0).abs() < 1e-9);
        assert!((score.cost() - 1000.0).abs() < 1e-9);
        assert!((score.area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_area_means_zero_score() {
        let score = Score::from_area(0.0, 0.9, 5000.0);
        assert_eq!(score, Score::zero());
    }

    #[test]
    fn test_score_clamps_inputs() {
        let score = Score::from_area(3.0, -1.0, f64::NAN);
        assert_eq!(score.area(), 1.0);
        assert_eq!(score.impact(), 0.0);
        assert_eq!(score.cost(), 0.0);
    }

    #[test]
    fn test_solution_rejects_negative_cost() {
        let result = Solution::new(SolutionId::new("Wetland"), vec![], -1.0);
        assert!(matches!(result, Err(NbsError::InvalidConfig(_))));
    }

    #[test]
    fn test_solution_dedups_criteria() {
        let solution = Solution::new(
            SolutionId::new("Hedgerow"),
            vec!["a".into(), "b".into(), "a".into()],
            10.0,
        )
        .unwrap();
        assert_eq!(solution.criteria().len(), 2);
        assert!(solution.is_scorable());
    }

    #[test]
    fn test_category_missing_weight_is_zero() {
        let mut weights = BTreeMap::new();
        weights.insert(SolutionId::new("Wetland"), 0.5);
        let category = ChallengeCategory::new("Flooding", weights).unwrap();
        assert_eq!(category.weight(&SolutionId::new("Wetland")), 0.5);
        assert_eq!(category.weight(&SolutionId::new("Woodland")), 0.0);
    }

    #[test]
    fn test_ranking_mode_toggle_and_parse() {
        assert_eq!(RankingMode::Impact.toggled(), RankingMode::Cost);
        assert_eq!("COST".parse::<RankingMode>().unwrap(), RankingMode::Cost);
        assert!("area".parse::<RankingMode>().is_err());
    }
}
