use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::core::{cycle_seed, run_cycle, NearestGreedyMatcher, PointGenerator, DEFAULT_MAX_COUNT};
use crate::models::{BoundingBox, GenerationParams, SnapshotRequestOptions, SnapshotResponse};

/// Default bound on a snapshot fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Errors that can occur when fetching a snapshot
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Snapshot service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

/// Client for `GET /api/snapshot/`
///
/// Consumers either fetch from a running service or fall back to
/// [`mock_snapshot`]; both produce the same shape.
pub struct SnapshotClient {
    base_url: String,
    client: Client,
}

impl SnapshotClient {
    /// Create a new client; `timeout` bounds the whole request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn with_default_timeout(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(base_url, DEFAULT_FETCH_TIMEOUT)
    }

    /// Fetch the current snapshot
    pub async fn fetch(
        &self,
        options: &SnapshotRequestOptions,
    ) -> Result<SnapshotResponse, ClientError> {
        let url = format!("{}/api/snapshot/", self.base_url.trim_end_matches('/'));

        tracing::debug!("Fetching snapshot from: {}", url);

        let response = self
            .client
            .get(&url)
            .query(options)
            .send()
            .await
            .map_err(|e| ClientError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "Failed to fetch snapshot: {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::UpstreamUnavailable(e.to_string()))?;

        serde_json::from_slice(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse snapshot: {}", e)))
    }
}

/// Local stand-in for the snapshot endpoint.
///
/// Runs the same generator and matcher in-process. Out-of-range options are
/// clamped rather than rejected so the fallback never fails.
pub fn mock_snapshot(options: &SnapshotRequestOptions, bounds: &BoundingBox) -> SnapshotResponse {
    let match_ratio = options
        .match_ratio
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(0.0, 1.0))
        .unwrap_or(0.7);
    let bounds = if bounds.is_valid() { *bounds } else { BoundingBox::default() };

    let params = GenerationParams {
        driver_count: options.drivers.map(|n| n.min(DEFAULT_MAX_COUNT)),
        user_count: options.users.map(|n| n.min(DEFAULT_MAX_COUNT)),
        max_count: DEFAULT_MAX_COUNT,
        match_ratio,
        regen_seconds: 1,
        seed: options.seed,
        force: false,
        include_meta: false,
        bounds,
    };

    let generator = PointGenerator::default();
    let matcher = NearestGreedyMatcher::default();

    match run_cycle(&generator, &matcher, &params, cycle_seed(&params)) {
        Ok(output) => SnapshotResponse {
            drivers: output.drivers,
            users: output.users,
            matchs: output.matches,
            meta: None,
        },
        Err(e) => {
            tracing::warn!("Mock snapshot generation failed: {}", e);
            SnapshotResponse {
                drivers: vec![],
                users: vec![],
                matchs: vec![],
                meta: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_snapshot_shape() {
        let options = SnapshotRequestOptions {
            drivers: Some(8),
            users: Some(6),
            match_ratio: Some(1.0),
            seed: Some(11),
            force: false,
        };

        let snapshot = mock_snapshot(&options, &BoundingBox::default());

        assert_eq!(snapshot.drivers.len(), 8);
        assert_eq!(snapshot.users.len(), 6);
        assert_eq!(snapshot.matchs.len(), 6);
        assert!(snapshot.meta.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(json.get("matchs").is_some());
    }

    #[test]
    fn test_mock_snapshot_clamps_options() {
        let options = SnapshotRequestOptions {
            drivers: Some(5000),
            users: Some(2),
            match_ratio: Some(7.0),
            seed: Some(1),
            force: false,
        };

        let snapshot = mock_snapshot(&options, &BoundingBox::default());
        assert_eq!(snapshot.drivers.len(), DEFAULT_MAX_COUNT);
        assert_eq!(snapshot.matchs.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_decodes_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "drivers": [{"id": "driver_1", "lat": 35.7, "lng": 51.4}],
            "users": [{"id": "user_1", "lat": 35.71, "lng": 51.41}],
            "matchs": [{"driver": "driver_1", "user": "user_1"}]
        });
        let mock = server
            .mock("GET", "/api/snapshot/")
            .match_query(mockito::Matcher::UrlEncoded("drivers".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = SnapshotClient::with_default_timeout(server.url()).unwrap();
        let options = SnapshotRequestOptions {
            drivers: Some(1),
            ..SnapshotRequestOptions::default()
        };
        let snapshot = client.fetch(&options).await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.matchs[0].driver, "driver_1");
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/snapshot/")
            .with_status(500)
            .create_async()
            .await;

        let client = SnapshotClient::with_default_timeout(server.url()).unwrap();
        let err = client.fetch(&SnapshotRequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Api(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_wrong_shape() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/snapshot/")
            .with_status(200)
            .with_body(r#"{"drivers": []}"#)
            .create_async()
            .await;

        let client = SnapshotClient::with_default_timeout(server.url()).unwrap();
        let err = client.fetch(&SnapshotRequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_upstream_unavailable() {
        let client = SnapshotClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = client.fetch(&SnapshotRequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::UpstreamUnavailable(_)));
    }
}
