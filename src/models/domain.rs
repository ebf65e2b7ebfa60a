use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A labeled coordinate belonging to either the driver or the user set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

/// An assigned (driver, user) pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub driver: String,
    pub user: String,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// True when both ranges lie on the globe and are not inverted
    pub fn is_valid(&self) -> bool {
        let lat = -90.0..=90.0;
        let lng = -180.0..=180.0;
        lat.contains(&self.min_lat)
            && lat.contains(&self.max_lat)
            && lng.contains(&self.min_lng)
            && lng.contains(&self.max_lng)
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }
}

impl Default for BoundingBox {
    /// Tehran city box
    fn default() -> Self {
        Self {
            min_lat: 35.60,
            max_lat: 35.82,
            min_lng: 51.20,
            max_lng: 51.60,
        }
    }
}

/// Validated parameters for one regeneration cycle.
///
/// Built only by [`crate::core::params::resolve`] on the request path; the
/// fields are public so callers embedding the store can construct them directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Fixed driver count, or `None` to draw one in `[0, max_count]` per cycle
    pub driver_count: Option<usize>,
    /// Fixed user count, or `None` to draw one in `[0, max_count]` per cycle
    pub user_count: Option<usize>,
    pub max_count: usize,
    pub match_ratio: f64,
    pub regen_seconds: u64,
    pub seed: Option<u64>,
    pub force: bool,
    pub include_meta: bool,
    pub bounds: BoundingBox,
}

impl GenerationParams {
    /// Whether a snapshot generated with `other` satisfies a request for `self`.
    ///
    /// Only the inputs of generation count; TTL, force and response shape do not.
    pub fn same_generation(&self, other: &GenerationParams) -> bool {
        self.driver_count == other.driver_count
            && self.user_count == other.user_count
            && self.max_count == other.max_count
            && self.match_ratio.to_bits() == other.match_ratio.to_bits()
            && self.seed == other.seed
            && self.bounds == other.bounds
    }
}

/// Immutable, timestamped bundle of point sets and their matching
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub drivers: Vec<TrackedPoint>,
    pub users: Vec<TrackedPoint>,
    pub matches: Vec<MatchPair>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub params: GenerationParams,
    /// Effective cycle seed; passing it back as `seed` reproduces the snapshot
    pub seed: u64,
    pub epoch: u64,
}

/// Shared handle readers receive from the store
pub type SharedSnapshot = Arc<Snapshot>;
