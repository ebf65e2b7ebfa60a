// Core algorithm exports
pub mod cycle;
pub mod distance;
pub mod error;
pub mod generator;
pub mod matcher;
pub mod params;

pub use cycle::{run_cycle, cycle_seed, CycleOutput};
pub use distance::{haversine_distance, point_distance, is_within_bounding_box};
pub use error::SnapshotError;
pub use generator::{PointGenerator, DEFAULT_MAX_COUNT};
pub use matcher::{NearestGreedyMatcher, DEFAULT_MATCH_JITTER};
pub use params::{resolve, SnapshotDefaults};
