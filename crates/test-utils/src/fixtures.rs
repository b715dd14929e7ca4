//! Common test fixtures for suitability tests.

/// Common bounding boxes as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Raster extent used by most fixtures: one degree around Bristol.
    pub const STUDY_AREA: (f64, f64, f64, f64) = (-3.0, 51.0, -2.0, 52.0);

    /// A viewport well inside [`STUDY_AREA`], roughly 1 km across.
    pub const SMALL_VIEWPORT: (f64, f64, f64, f64) = (-2.60, 51.45, -2.585, 51.459);

    /// A viewport inside [`STUDY_AREA`] that does not overlap [`SMALL_VIEWPORT`].
    pub const OTHER_VIEWPORT: (f64, f64, f64, f64) = (-2.30, 51.70, -2.285, 51.709);

    /// Far from [`STUDY_AREA`].
    pub const DISJOINT: (f64, f64, f64, f64) = (10.0, 10.0, 11.0, 11.0);
}

/// Configuration documents as JSON text.
pub mod config {
    /// Single solution backed by a single criterion.
    pub const WETLAND_CRITERIA: &str = r#"{"Wetland": ["wet_soil"]}"#;
    pub const WETLAND_CATEGORIES: &str = r#"{"Flooding": {"Wetland": 0.5}}"#;
    pub const WETLAND_COSTS: &str = r#"{"Wetland": 1000}"#;

    /// Three solutions over two criteria with two categories.
    pub const MULTI_CRITERIA: &str = r#"{
        "Wetland": ["wet_soil"],
        "Woodland": ["wet_soil", "slope"],
        "Meadow": ["slope"],
        "Unmapped": []
    }"#;
    pub const MULTI_CATEGORIES: &str = r#"{
        "Flooding": {"Wetland": 0.5, "Woodland": 0.3, "Meadow": 0.1},
        "Heat": {"Woodland": 0.9}
    }"#;
    pub const MULTI_COSTS: &str = r#"{"Wetland": 1000, "Woodland": 400, "Meadow": 50}"#;
}
