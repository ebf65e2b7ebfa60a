use serde::{Deserialize, Serialize};

/// Raw query overrides for `GET /api/snapshot/`
///
/// Every field is kept as the literal string so the resolver can report which
/// field failed to parse instead of rejecting the whole query opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub drivers: Option<String>,
    pub users: Option<String>,
    pub max_count: Option<String>,
    pub regen_seconds: Option<String>,
    pub match_ratio: Option<String>,
    pub force: Option<String>,
    pub seed: Option<String>,
    pub meta: Option<String>,
}

/// Typed request options used by the snapshot client and the local mock
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drivers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not", serialize_with = "serialize_flag")]
    pub force: bool,
}

fn serialize_flag<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(if *value { "1" } else { "0" })
}
