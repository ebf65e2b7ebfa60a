use serde::{Deserialize, Serialize};
use crate::models::domain::{BoundingBox, MatchPair, Snapshot, TrackedPoint};

/// Response for the snapshot endpoint.
///
/// The default shape is exactly `{drivers, users, matchs}`; `_meta` only
/// appears when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub drivers: Vec<TrackedPoint>,
    pub users: Vec<TrackedPoint>,
    pub matchs: Vec<MatchPair>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
}

/// Debug information attached with `meta=1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub epoch: u64,
    pub seed: u64,
    pub regen_seconds: u64,
    pub max_count: usize,
    pub match_ratio: f64,
    pub bounds: BoundingBox,
    pub counts: SnapshotCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub drivers: usize,
    pub users: usize,
    pub matchs: usize,
}

impl SnapshotResponse {
    /// Build the wire shape from a published snapshot
    ///
    /// `regen_seconds` is the TTL the caller asked for, which may differ from
    /// the one the snapshot was generated under.
    pub fn from_snapshot(snapshot: &Snapshot, include_meta: bool, regen_seconds: u64) -> Self {
        let meta = include_meta.then(|| SnapshotMeta {
            generated_at: snapshot.generated_at,
            epoch: snapshot.epoch,
            seed: snapshot.seed,
            regen_seconds,
            max_count: snapshot.params.max_count,
            match_ratio: snapshot.params.match_ratio,
            bounds: snapshot.params.bounds,
            counts: SnapshotCounts {
                drivers: snapshot.drivers.len(),
                users: snapshot.users.len(),
                matchs: snapshot.matches.len(),
            },
        });

        Self {
            drivers: snapshot.drivers.clone(),
            users: snapshot.users.clone(),
            matchs: snapshot.matches.clone(),
            meta,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub has_snapshot: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub status_code: u16,
}
