//! Grid cells and their canonical keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::{BoundingBox, CriterionId, NbsError, Score, SolutionId};

/// Meters per degree of latitude (treated as constant).
pub const METERS_PER_DEGREE: f64 = 111_111.0;

/// Latitude limit used for the longitude cosine correction.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Fixed decimal precision of cell keys (6 decimals).
const KEY_SCALE: f64 = 1_000_000.0;
const KEY_SCALE_INT: i64 = 1_000_000;

/// Per-solution scores of a cell, ordered by solution id.
pub type ScoreMap = BTreeMap<SolutionId, Score>;

/// Canonical identity of a cell: its quantized south-west corner.
///
/// Stored as micro-degrees so comparisons are exact. Conversion from
/// degrees truncates toward zero, never rounds, so identical inputs always
/// produce identical keys. Formats as `"lat,lng"` with six decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    lat_e6: i64,
    lng_e6: i64,
}

impl CellKey {
    /// Build a key from a south-west corner in degrees.
    pub fn from_degrees(lat: f64, lng: f64) -> Self {
        Self {
            lat_e6: truncate_e6(lat),
            lng_e6: truncate_e6(lng),
        }
    }

    /// Key of the cell containing an arbitrary point, with the cell size
    /// computed at that point's latitude.
    pub fn for_point(lat: f64, lng: f64, edge_meters: f64) -> Self {
        CellSize::at_latitude(edge_meters, lat).key_for(lat, lng)
    }

    /// Latitude of the south-west corner.
    pub fn lat(&self) -> f64 {
        self.lat_e6 as f64 / KEY_SCALE
    }

    /// Longitude of the south-west corner.
    pub fn lng(&self) -> f64 {
        self.lng_e6 as f64 / KEY_SCALE
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", format_e6(self.lat_e6), format_e6(self.lng_e6))
    }
}

impl FromStr for CellKey {
    type Err = NbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| NbsError::InvalidCellKey(s.to_string()))?;
        match (parse_e6(lat), parse_e6(lng)) {
            (Some(lat_e6), Some(lng_e6)) => Ok(Self { lat_e6, lng_e6 }),
            _ => Err(NbsError::InvalidCellKey(s.to_string())),
        }
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn truncate_e6(degrees: f64) -> i64 {
    if degrees.is_finite() {
        (degrees * KEY_SCALE).trunc() as i64
    } else {
        0
    }
}

fn format_e6(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let scale = KEY_SCALE_INT as u64;
    format!("{}{}.{:06}", sign, abs / scale, abs % scale)
}

fn parse_e6(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty()
        || frac_part.len() > 6
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let int: i64 = int_part.parse().ok()?;
    let frac: i64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse::<i64>().ok()? * 10_i64.pow(6 - frac_part.len() as u32)
    };
    let value = int.checked_mul(KEY_SCALE_INT)?.checked_add(frac)?;
    Some(if negative { -value } else { value })
}

/// Cell edge lengths in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSize {
    pub lat_deg: f64,
    pub lng_deg: f64,
}

impl CellSize {
    /// Convert a meter edge length into degrees at the given latitude.
    ///
    /// Latitude degrees have a constant size; longitude degrees shrink
    /// with `cos(latitude)`.
    pub fn at_latitude(edge_meters: f64, latitude: f64) -> Self {
        let latitude = if latitude.is_finite() {
            latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE)
        } else {
            0.0
        };
        Self {
            lat_deg: edge_meters / METERS_PER_DEGREE,
            lng_deg: edge_meters / (METERS_PER_DEGREE * latitude.to_radians().cos()),
        }
    }

    /// Both edges are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.lat_deg.is_finite() && self.lng_deg.is_finite() && self.lat_deg > 0.0 && self.lng_deg > 0.0
    }

    /// South-west corner of the cell with integer indices `(row, col)`.
    pub fn corner(&self, row: i64, col: i64) -> (f64, f64) {
        (row as f64 * self.lat_deg, col as f64 * self.lng_deg)
    }

    /// Key of the cell of this size that contains the point.
    pub fn key_for(&self, lat: f64, lng: f64) -> CellKey {
        let row = (lat / self.lat_deg).floor() as i64;
        let col = (lng / self.lng_deg).floor() as i64;
        let (corner_lat, corner_lng) = self.corner(row, col);
        CellKey::from_degrees(corner_lat, corner_lng)
    }
}

/// A fixed-size quantized geographic cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    key: CellKey,
    bounds: BoundingBox,
    scores: Option<ScoreMap>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    present: BTreeSet<CriterionId>,
}

impl Cell {
    /// Create an unscored cell.
    pub fn new(key: CellKey, bounds: BoundingBox) -> Self {
        Self {
            key,
            bounds,
            scores: None,
            present: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> CellKey {
        self.key
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn scores(&self) -> Option<&ScoreMap> {
        self.scores.as_ref()
    }

    pub fn is_scored(&self) -> bool {
        self.scores.is_some()
    }

    /// Replace the cell's scores.
    pub fn set_scores(&mut self, scores: ScoreMap) {
        self.scores = Some(scores);
    }

    /// Criteria sampled as present at the representative point when the
    /// cell was last scored.
    pub fn present_criteria(&self) -> &BTreeSet<CriterionId> {
        &self.present
    }

    pub fn set_present_criteria(&mut self, present: BTreeSet<CriterionId>) {
        self.present = present;
    }

    /// Point sampled for this cell: its key-derived south-west corner,
    /// as `(lat, lng)`.
    pub fn representative_point(&self) -> (f64, f64) {
        (self.key.lat(), self.key.lng())
    }
}
