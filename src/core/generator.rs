use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::error::SnapshotError;
use crate::models::{BoundingBox, TrackedPoint};

/// Default ceiling on the size of one point set
pub const DEFAULT_MAX_COUNT: usize = 1000;

/// Produces reproducible labeled point sets inside a bounding box.
///
/// Uses ChaCha8, whose output stream is stable across platforms and `rand`
/// releases, so a seed always maps to the same coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PointGenerator {
    max_count: usize,
}

impl PointGenerator {
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Generate `count` points named `{id_prefix}_{n}` for n in `1..=count`
    ///
    /// Without a seed the generator is seeded from OS entropy and the output is
    /// not reproducible.
    pub fn generate(
        &self,
        count: usize,
        bounds: &BoundingBox,
        seed: Option<u64>,
        id_prefix: &str,
    ) -> Result<Vec<TrackedPoint>, SnapshotError> {
        if count > self.max_count {
            return Err(SnapshotError::invalid(
                "count",
                format!("{} exceeds the maximum of {}", count, self.max_count),
            ));
        }
        if !bounds.is_valid() {
            return Err(SnapshotError::invalid(
                "bounds",
                format!("{:?} is not a valid bounding box", bounds),
            ));
        }

        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let points = (0..count)
            .map(|i| {
                let lat = rng.gen_range(bounds.min_lat..=bounds.max_lat);
                let lng = rng.gen_range(bounds.min_lng..=bounds.max_lng);
                TrackedPoint {
                    id: format!("{}_{}", id_prefix, i + 1),
                    lat,
                    lng,
                }
            })
            .collect();

        Ok(points)
    }
}

impl Default for PointGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COUNT)
    }
}
