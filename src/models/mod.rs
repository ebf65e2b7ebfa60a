// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{TrackedPoint, MatchPair, BoundingBox, GenerationParams, Snapshot, SharedSnapshot};
pub use requests::{SnapshotQuery, SnapshotRequestOptions};
pub use responses::{SnapshotResponse, SnapshotMeta, SnapshotCounts, HealthResponse, ErrorResponse};
