use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::distance::point_distance;
use crate::core::error::SnapshotError;
use crate::models::{MatchPair, TrackedPoint};

/// Default relative jitter applied to the match target
pub const DEFAULT_MATCH_JITTER: f64 = 0.10;

/// Greedy global-nearest bipartite matcher
///
/// # Algorithm
/// 1. Target `T = round(ratio * min(D, U))`, perturbed by a seeded relative
///    jitter in `[-j, +j]` unless the ratio is exactly 0 or 1, then clamped
/// 2. Repeatedly take the closest (haversine) unmatched driver/user pair,
///    ties broken by `(driver_index, user_index)`
/// 3. Stop after `T` pairs or when either side runs out
///
/// Repeatedly taking the global minimum over the remaining pairs is the same
/// as scanning all pairs once in `(distance, driver_index, user_index)` order
/// and skipping pairs whose endpoints are taken, which is what `match_pairs`
/// does: `O(D*U log(D*U))` instead of `O(T*D*U)`.
#[derive(Debug, Clone, Copy)]
pub struct NearestGreedyMatcher {
    jitter: f64,
}

impl NearestGreedyMatcher {
    pub fn new(jitter: f64) -> Self {
        Self { jitter }
    }

    /// Matcher whose target is exactly `round(ratio * min(D, U))`
    pub fn without_jitter() -> Self {
        Self { jitter: 0.0 }
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Number of pairs to form for `limit = min(D, U)` at `match_ratio`
    pub fn target_count(&self, limit: usize, match_ratio: f64, rng: &mut impl Rng) -> usize {
        let base = (match_ratio * limit as f64).round();

        let target = if self.jitter > 0.0 && match_ratio > 0.0 && match_ratio < 1.0 {
            let factor = 1.0 + rng.gen_range(-self.jitter..=self.jitter);
            (base * factor).round()
        } else {
            base
        };

        target.clamp(0.0, limit as f64) as usize
    }

    /// Compute a one-to-one assignment between `drivers` and `users`
    ///
    /// Pairs come back in selection order, so the last element is the most
    /// recently formed pair.
    pub fn match_pairs(
        &self,
        drivers: &[TrackedPoint],
        users: &[TrackedPoint],
        match_ratio: f64,
        seed: Option<u64>,
    ) -> Result<Vec<MatchPair>, SnapshotError> {
        if !(0.0..=1.0).contains(&match_ratio) {
            return Err(SnapshotError::invalid(
                "match_ratio",
                format!("{} is outside [0, 1]", match_ratio),
            ));
        }

        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let limit = drivers.len().min(users.len());
        let target = self.target_count(limit, match_ratio, &mut rng);
        if target == 0 {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(drivers.len() * users.len());
        for (di, driver) in drivers.iter().enumerate() {
            for (ui, user) in users.iter().enumerate() {
                candidates.push((point_distance(driver, user), di, ui));
            }
        }

        // Indices make every key unique, so an unstable sort is deterministic
        candidates.sort_unstable_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut driver_taken = vec![false; drivers.len()];
        let mut user_taken = vec![false; users.len()];
        let mut pairs = Vec::with_capacity(target);

        for (_, di, ui) in candidates {
            if driver_taken[di] || user_taken[ui] {
                continue;
            }
            driver_taken[di] = true;
            user_taken[ui] = true;
            pairs.push(MatchPair {
                driver: drivers[di].id.clone(),
                user: users[ui].id.clone(),
            });
            if pairs.len() >= target {
                break;
            }
        }

        Ok(pairs)
    }
}

impl Default for NearestGreedyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_JITTER)
    }
}
