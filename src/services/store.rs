use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::core::{cycle_seed, run_cycle, CycleOutput, NearestGreedyMatcher, PointGenerator, SnapshotError};
use crate::models::{GenerationParams, SharedSnapshot, Snapshot};

/// Outcome of one regeneration, `None` until it settles
type Outcome = Option<Result<SharedSnapshot, SnapshotError>>;

struct Published {
    snapshot: SharedSnapshot,
    published_at: Instant,
}

struct InFlight {
    params: GenerationParams,
    rx: watch::Receiver<Outcome>,
}

#[derive(Default)]
struct StoreState {
    current: Option<Published>,
    in_flight: Option<InFlight>,
}

enum Step {
    Ready(SharedSnapshot),
    Join { rx: watch::Receiver<Outcome>, same: bool },
    Lead(watch::Receiver<Outcome>),
}

/// Owner of the current snapshot with single-flight regeneration.
///
/// States: empty, fresh, stale and regenerating. A request is served from
/// cache when the snapshot is younger than its `regen_seconds`, it is not
/// forced, and it was generated from the same inputs. Otherwise exactly one
/// caller starts a regeneration; everyone else awaits its outcome.
///
/// The regeneration runs in its own task, so a caller that goes away does not
/// cancel it for the others.
pub struct SnapshotStore {
    generator: PointGenerator,
    matcher: NearestGreedyMatcher,
    state: RwLock<StoreState>,
    generations: AtomicU64,
}

impl SnapshotStore {
    pub fn new(generator: PointGenerator, matcher: NearestGreedyMatcher) -> Self {
        Self {
            generator,
            matcher,
            state: RwLock::new(StoreState::default()),
            generations: AtomicU64::new(0),
        }
    }

    /// Return a snapshot satisfying `params`, regenerating if needed
    pub async fn get(
        self: &Arc<Self>,
        params: &GenerationParams,
    ) -> Result<SharedSnapshot, SnapshotError> {
        loop {
            match self.next_step(params) {
                Step::Ready(snapshot) => {
                    tracing::debug!("Snapshot cache hit (epoch {})", snapshot.epoch);
                    return Ok(snapshot);
                }
                Step::Lead(rx) => return wait_for_outcome(rx).await,
                Step::Join { rx, same } => {
                    tracing::debug!("Awaiting in-flight regeneration (same inputs: {})", same);
                    let outcome = wait_for_outcome(rx).await;
                    if same {
                        return outcome;
                    }
                    // Generated for other inputs; decide again now that it settled
                }
            }
        }
    }

    /// Currently published snapshot, if any
    pub fn current(&self) -> Option<SharedSnapshot> {
        self.read_state()
            .current
            .as_ref()
            .map(|p| Arc::clone(&p.snapshot))
    }

    pub fn has_snapshot(&self) -> bool {
        self.read_state().current.is_some()
    }

    /// Parameters of the last published snapshot, as a non-forced request
    pub fn last_params(&self) -> Option<GenerationParams> {
        self.read_state().current.as_ref().map(|p| GenerationParams {
            force: false,
            include_meta: false,
            ..p.snapshot.params
        })
    }

    /// Instant the published snapshot goes stale under its own `regen_seconds`
    pub fn expires_at(&self) -> Option<Instant> {
        self.read_state().current.as_ref().map(|p| {
            p.published_at + Duration::from_secs(p.snapshot.params.regen_seconds)
        })
    }

    /// Number of regenerations started since construction
    pub fn generation_count(&self) -> u64 {
        self.generations.load(Ordering::SeqCst)
    }

    fn next_step(self: &Arc<Self>, params: &GenerationParams) -> Step {
        let now = Instant::now();

        if !params.force {
            if let Some(snapshot) = fresh(&self.read_state(), params, now) {
                return Step::Ready(snapshot);
            }
        }

        let mut state = self.write_state();

        if let Some(flight) = &state.in_flight {
            // A closed sender means the regeneration task was dropped without settling
            if flight.rx.has_changed().is_ok() {
                return Step::Join {
                    rx: flight.rx.clone(),
                    same: flight.params.same_generation(params),
                };
            }
            tracing::warn!("Discarding abandoned regeneration slot");
            state.in_flight = None;
        }

        if !params.force {
            if let Some(snapshot) = fresh(&state, params, now) {
                return Step::Ready(snapshot);
            }
        }

        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(InFlight {
            params: *params,
            rx: rx.clone(),
        });
        drop(state);

        let epoch = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawn_regeneration(*params, epoch, tx);

        Step::Lead(rx)
    }

    fn spawn_regeneration(
        self: &Arc<Self>,
        params: GenerationParams,
        epoch: u64,
        tx: watch::Sender<Outcome>,
    ) {
        let store = Arc::clone(self);
        let generator = self.generator;
        let matcher = self.matcher;

        tokio::spawn(async move {
            let started = Instant::now();
            let computed = tokio::task::spawn_blocking(move || {
                run_cycle(&generator, &matcher, &params, cycle_seed(&params))
            })
            .await
            .unwrap_or_else(|e| {
                Err(SnapshotError::GenerationFailure(format!(
                    "regeneration task failed: {}",
                    e
                )))
            });

            let outcome = store.publish(computed, params, epoch);
            match &outcome {
                Ok(snapshot) => tracing::info!(
                    "Published snapshot epoch {} ({} drivers, {} users, {} matchs) in {:?}",
                    epoch,
                    snapshot.drivers.len(),
                    snapshot.users.len(),
                    snapshot.matches.len(),
                    started.elapsed()
                ),
                Err(e) => tracing::warn!("Regeneration epoch {} failed: {}", epoch, e),
            }

            // Every waiter may have gone away; the published snapshot still stands
            let _ = tx.send(Some(outcome));
        });
    }

    /// Swap in the new snapshot and free the slot in one critical section
    fn publish(
        &self,
        computed: Result<CycleOutput, SnapshotError>,
        params: GenerationParams,
        epoch: u64,
    ) -> Result<SharedSnapshot, SnapshotError> {
        let mut state = self.write_state();
        state.in_flight = None;

        let output = computed?;

        // Publish timestamps strictly increase even on a coarse clock
        let mut generated_at = chrono::Utc::now();
        if let Some(previous) = &state.current {
            let floor = previous.snapshot.generated_at + chrono::Duration::microseconds(1);
            if generated_at < floor {
                generated_at = floor;
            }
        }

        let snapshot = Arc::new(Snapshot {
            drivers: output.drivers,
            users: output.users,
            matches: output.matches,
            generated_at,
            params,
            seed: output.seed,
            epoch,
        });

        state.current = Some(Published {
            snapshot: Arc::clone(&snapshot),
            published_at: Instant::now(),
        });

        Ok(snapshot)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fresh(state: &StoreState, params: &GenerationParams, now: Instant) -> Option<SharedSnapshot> {
    let published = state.current.as_ref()?;
    let ttl = Duration::from_secs(params.regen_seconds);

    let young = now.saturating_duration_since(published.published_at) < ttl;
    if young && published.snapshot.params.same_generation(params) {
        Some(Arc::clone(&published.snapshot))
    } else {
        None
    }
}

async fn wait_for_outcome(
    mut rx: watch::Receiver<Outcome>,
) -> Result<SharedSnapshot, SnapshotError> {
    let settled = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };

    settled.unwrap_or_else(|| {
        Err(SnapshotError::GenerationFailure(
            "regeneration was abandoned before publishing".to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn store() -> Arc<SnapshotStore> {
        Arc::new(SnapshotStore::new(
            PointGenerator::default(),
            NearestGreedyMatcher::default(),
        ))
    }

    fn params() -> GenerationParams {
        GenerationParams {
            driver_count: Some(20),
            user_count: Some(15),
            max_count: 1000,
            match_ratio: 0.7,
            regen_seconds: 60,
            seed: Some(3),
            force: false,
            include_meta: false,
            bounds: BoundingBox::default(),
        }
    }

    #[tokio::test]
    async fn test_empty_store_generates() {
        let store = store();
        assert!(!store.has_snapshot());

        let snapshot = store.get(&params()).await.unwrap();

        assert_eq!(snapshot.drivers.len(), 20);
        assert_eq!(snapshot.users.len(), 15);
        assert_eq!(snapshot.epoch, 1);
        assert!(store.has_snapshot());
        assert_eq!(store.generation_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_reused() {
        let store = store();

        let first = store.get(&params()).await.unwrap();
        let second = store.get(&params()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.generation_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_inputs_regenerate() {
        let store = store();

        let first = store.get(&params()).await.unwrap();
        let other = GenerationParams { driver_count: Some(5), ..params() };
        let second = store.get(&other).await.unwrap();

        assert_eq!(second.drivers.len(), 5);
        assert!(second.generated_at > first.generated_at);
        assert_eq!(store.generation_count(), 2);
    }

    #[tokio::test]
    async fn test_expires_at_follows_published_ttl() {
        let store = store();
        assert!(store.expires_at().is_none());

        let before = Instant::now();
        store.get(&params()).await.unwrap();
        let after = Instant::now();

        let expires = store.expires_at().unwrap();
        assert!(expires >= before + Duration::from_secs(60));
        assert!(expires <= after + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_last_params_clears_request_flags() {
        let store = store();
        assert!(store.last_params().is_none());

        let forced = GenerationParams { force: true, include_meta: true, ..params() };
        store.get(&forced).await.unwrap();

        let last = store.last_params().unwrap();
        assert!(!last.force);
        assert!(!last.include_meta);
        assert!(last.same_generation(&params()));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let store = Arc::new(SnapshotStore::new(
            PointGenerator::new(50),
            NearestGreedyMatcher::default(),
        ));
        let good = GenerationParams { max_count: 50, ..params() };
        let published = store.get(&good).await.unwrap();

        let bad = GenerationParams { driver_count: Some(51), force: true, ..good };
        let err = store.get(&bad).await.unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidParameter { .. }));

        let current = store.current().unwrap();
        assert!(Arc::ptr_eq(&current, &published));

        // The slot was released, so the next call can regenerate again
        let retried = store.get(&GenerationParams { force: true, ..good }).await.unwrap();
        assert!(retried.epoch > published.epoch);
    }
}
