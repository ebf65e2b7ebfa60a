//! Dispatch Snapshot - synthetic driver/user snapshots with nearest-pair matching
//!
//! This library generates reproducible driver and user point sets, pairs them
//! with a greedy global-nearest matcher, and serves the result from a cache
//! that regenerates at most once at a time.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{NearestGreedyMatcher, PointGenerator, SnapshotError, SnapshotDefaults, resolve, distance::haversine_distance};
pub use models::{TrackedPoint, MatchPair, BoundingBox, GenerationParams, Snapshot, SnapshotQuery, SnapshotResponse};
pub use services::{SnapshotStore, BackgroundRegenerator, SnapshotClient, mock_snapshot};
