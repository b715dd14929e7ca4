//! Common types shared by every crate of the NBS suitability engine.

pub mod bbox;
pub mod cell;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use bbox::BoundingBox;
pub use cell::{Cell, CellKey, CellSize, ScoreMap};
pub use config::{ConfigDocument, ConfigDocuments, ConfigSnapshot};
pub use error::{NbsError, NbsResult};
pub use ids::{CriterionId, SolutionId};
pub use model::{ChallengeCategory, RankingMode, Score, Solution};
