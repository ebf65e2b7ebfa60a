use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::error::SnapshotError;
use crate::core::generator::PointGenerator;
use crate::core::matcher::NearestGreedyMatcher;
use crate::models::{GenerationParams, MatchPair, TrackedPoint};

/// Point sets and matching produced by one regeneration cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub drivers: Vec<TrackedPoint>,
    pub users: Vec<TrackedPoint>,
    pub matches: Vec<MatchPair>,
    pub seed: u64,
}

/// Run generation and matching once.
///
/// Every random draw derives from `cycle_seed`: counts use `seed`, drivers
/// `seed + 1`, users `seed + 2` and the matcher `seed + 3`, each with its own
/// generator instance.
pub fn run_cycle(
    generator: &PointGenerator,
    matcher: &NearestGreedyMatcher,
    params: &GenerationParams,
    cycle_seed: u64,
) -> Result<CycleOutput, SnapshotError> {
    let mut count_rng = ChaCha8Rng::seed_from_u64(cycle_seed);
    let driver_count = params
        .driver_count
        .unwrap_or_else(|| count_rng.gen_range(0..=params.max_count));
    let user_count = params
        .user_count
        .unwrap_or_else(|| count_rng.gen_range(0..=params.max_count));

    let drivers = generator.generate(
        driver_count,
        &params.bounds,
        Some(cycle_seed.wrapping_add(1)),
        "driver",
    )?;
    let users = generator.generate(
        user_count,
        &params.bounds,
        Some(cycle_seed.wrapping_add(2)),
        "user",
    )?;
    let matches = matcher.match_pairs(
        &drivers,
        &users,
        params.match_ratio,
        Some(cycle_seed.wrapping_add(3)),
    )?;

    Ok(CycleOutput {
        drivers,
        users,
        matches,
        seed: cycle_seed,
    })
}

/// Seed for a cycle: the requested one, or fresh entropy
pub fn cycle_seed(params: &GenerationParams) -> u64 {
    params.seed.unwrap_or_else(rand::random)
}
