use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::GenerationParams;
use crate::services::store::SnapshotStore;

/// Shortest pause before retrying a snapshot that is already stale
const RETRY_FLOOR: Duration = Duration::from_secs(1);

/// Keeps the snapshot warm ahead of request traffic.
///
/// Each tick is scheduled for the moment the published snapshot expires and
/// asks the store for the last published parameters (or the defaults before
/// anything was published) without forcing. It goes through the same
/// single-flight path as requests, so a request that already refreshed the
/// snapshot turns the tick into a cache hit.
pub struct BackgroundRegenerator {
    store: Arc<SnapshotStore>,
    defaults: GenerationParams,
    interval: Duration,
}

impl BackgroundRegenerator {
    pub fn new(store: Arc<SnapshotStore>, defaults: GenerationParams) -> Self {
        let interval = Duration::from_secs(defaults.regen_seconds.max(1));
        Self {
            store,
            defaults,
            interval,
        }
    }

    /// Override the period used while the store is empty (defaults to `regen_seconds`)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Parameters the next tick will request
    pub fn tick_params(&self) -> GenerationParams {
        let mut params = self.store.last_params().unwrap_or(self.defaults);
        params.force = false;
        params
    }

    /// Run one refresh; failures are logged and left for the next tick
    pub async fn tick(&self) {
        let params = self.tick_params();
        match self.store.get(&params).await {
            Ok(snapshot) => tracing::trace!("Background tick served epoch {}", snapshot.epoch),
            Err(e) => tracing::warn!("Background regeneration failed: {}", e),
        }
    }

    /// When the next tick should fire, measured from `now`
    pub fn next_wake(&self, now: std::time::Instant) -> std::time::Instant {
        match self.store.expires_at() {
            Some(expires) if expires > now => expires,
            // Stale already: the last tick failed or the ttl is zero
            Some(_) => now + self.interval.min(RETRY_FLOOR),
            None => now + self.interval,
        }
    }

    /// Tick now, then at every expiry, until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Background regenerator started (idle period {:?})", self.interval);

        let mut wake = Instant::now();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(wake) => {
                    self.tick().await;
                    wake = Instant::from_std(self.next_wake(std::time::Instant::now()));
                }
            }
        }

        tracing::info!("Background regenerator stopped");
    }

    /// Spawn [`run`](Self::run) onto the current runtime
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NearestGreedyMatcher, PointGenerator, SnapshotDefaults};

    fn store() -> Arc<SnapshotStore> {
        Arc::new(SnapshotStore::new(
            PointGenerator::default(),
            NearestGreedyMatcher::default(),
        ))
    }

    fn defaults() -> GenerationParams {
        SnapshotDefaults {
            drivers: Some(10),
            users: Some(10),
            seed: Some(1),
            ..SnapshotDefaults::default()
        }
        .params()
    }

    #[tokio::test]
    async fn test_tick_warms_empty_store() {
        let store = store();
        let regenerator = BackgroundRegenerator::new(Arc::clone(&store), defaults());

        regenerator.tick().await;

        assert!(store.has_snapshot());
        assert_eq!(store.generation_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_follows_last_request() {
        let store = store();
        let requested = GenerationParams {
            driver_count: Some(3),
            force: true,
            ..defaults()
        };
        store.get(&requested).await.unwrap();

        let regenerator = BackgroundRegenerator::new(Arc::clone(&store), defaults());
        let params = regenerator.tick_params();
        assert_eq!(params.driver_count, Some(3));
        assert!(!params.force);

        // Still fresh, so the tick is a cache hit
        regenerator.tick().await;
        assert_eq!(store.generation_count(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let store = store();
        let token = CancellationToken::new();
        let handle = BackgroundRegenerator::new(Arc::clone(&store), defaults())
            .with_interval(Duration::from_millis(10))
            .spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(store.has_snapshot());
    }

    #[tokio::test]
    async fn test_next_wake_tracks_expiry() {
        let store = store();
        let regenerator = BackgroundRegenerator::new(Arc::clone(&store), defaults())
            .with_interval(Duration::from_secs(5));

        let now = std::time::Instant::now();
        assert_eq!(regenerator.next_wake(now), now + Duration::from_secs(5));

        regenerator.tick().await;
        let expires = store.expires_at().unwrap();
        assert_eq!(regenerator.next_wake(std::time::Instant::now()), expires);

        // Past the expiry the retry is bounded instead of immediate
        let later = expires + Duration::from_secs(1);
        assert_eq!(regenerator.next_wake(later), later + Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_refreshes_once_per_ttl() {
        let store = store();
        let params = GenerationParams {
            driver_count: Some(100),
            user_count: Some(100),
            regen_seconds: 1,
            seed: None,
            ..defaults()
        };
        let token = CancellationToken::new();
        let handle = BackgroundRegenerator::new(Arc::clone(&store), params).spawn(token.clone());

        let mut counts = Vec::new();
        tokio::time::sleep(Duration::from_millis(500)).await;
        counts.push(store.generation_count());
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            counts.push(store.generation_count());
        }

        token.cancel();
        handle.await.unwrap();

        assert_eq!(counts, vec![1, 2, 3, 4]);
    }
}
