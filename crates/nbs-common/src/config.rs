//! Static configuration documents and the validated snapshot built from them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{ChallengeCategory, CriterionId, NbsError, NbsResult, Solution, SolutionId};

/// One of the three JSON configuration documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigDocument {
    SolutionCriteria,
    ChallengeCategories,
    SolutionCosts,
}

impl ConfigDocument {
    pub const ALL: [ConfigDocument; 3] = [
        ConfigDocument::SolutionCriteria,
        ConfigDocument::ChallengeCategories,
        ConfigDocument::SolutionCosts,
    ];

    /// Document name, also used as its cache key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SolutionCriteria => "solutionCriteria",
            Self::ChallengeCategories => "challengeCategories",
            Self::SolutionCosts => "solutionCosts",
        }
    }

    /// File name relative to a configuration directory or base URL.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }
}

impl std::fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The raw configuration documents as fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocuments {
    pub solution_criteria: BTreeMap<SolutionId, Vec<CriterionId>>,
    pub challenge_categories: BTreeMap<String, BTreeMap<SolutionId, f64>>,
    pub solution_costs: BTreeMap<SolutionId, f64>,
}

impl ConfigDocuments {
    /// Parse one document's JSON into its slot.
    pub fn set_document(&mut self, document: ConfigDocument, json: &[u8]) -> NbsResult<()> {
        let parse_err = |e: serde_json::Error| NbsError::config_parse(document.name(), e.to_string());
        match document {
            ConfigDocument::SolutionCriteria => {
                self.solution_criteria = serde_json::from_slice(json).map_err(parse_err)?
            }
            ConfigDocument::ChallengeCategories => {
                self.challenge_categories = serde_json::from_slice(json).map_err(parse_err)?
            }
            ConfigDocument::SolutionCosts => {
                self.solution_costs = serde_json::from_slice(json).map_err(parse_err)?
            }
        }
        Ok(())
    }

    /// Serialize one document back to JSON (for caching).
    pub fn document_json(&self, document: ConfigDocument) -> NbsResult<Vec<u8>> {
        let json = match document {
            ConfigDocument::SolutionCriteria => serde_json::to_vec(&self.solution_criteria)?,
            ConfigDocument::ChallengeCategories => serde_json::to_vec(&self.challenge_categories)?,
            ConfigDocument::SolutionCosts => serde_json::to_vec(&self.solution_costs)?,
        };
        Ok(json)
    }
}

/// Validated, immutable configuration read by scoring.
///
/// Solutions are the keys of `solutionCriteria`; a solution missing from
/// `solutionCosts` has a unit cost of 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    solutions: BTreeMap<SolutionId, Solution>,
    categories: BTreeMap<String, ChallengeCategory>,
}

impl ConfigSnapshot {
    pub fn from_documents(documents: ConfigDocuments) -> NbsResult<Self> {
        let ConfigDocuments {
            solution_criteria,
            challenge_categories,
            solution_costs,
        } = documents;

        let mut solutions = BTreeMap::new();
        for (id, criteria) in solution_criteria {
            let unit_cost = solution_costs.get(&id).copied().unwrap_or(0.0);
            let solution = Solution::new(id.clone(), criteria, unit_cost)?;
            solutions.insert(id, solution);
        }

        let mut categories = BTreeMap::new();
        for (name, weights) in challenge_categories {
            let category = ChallengeCategory::new(name.clone(), weights)?;
            categories.insert(name, category);
        }

        Ok(Self {
            solutions,
            categories,
        })
    }

    pub fn solution(&self, id: &SolutionId) -> Option<&Solution> {
        self.solutions.get(id)
    }

    pub fn solutions(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.values()
    }

    pub fn solution_ids(&self) -> impl Iterator<Item = &SolutionId> {
        self.solutions.keys()
    }

    /// Look up a category by name.
    pub fn category(&self, name: &str) -> NbsResult<&ChallengeCategory> {
        self.categories
            .get(name)
            .ok_or_else(|| NbsError::UnknownCategory(name.to_string()))
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every criterion referenced by any configured solution.
    pub fn criteria(&self) -> BTreeSet<CriterionId> {
        self.solutions
            .values()
            .flat_map(|s| s.criteria().iter().cloned())
            .collect()
    }
}
