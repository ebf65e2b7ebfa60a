use validator::Validate;

use crate::core::error::SnapshotError;
use crate::models::{BoundingBox, GenerationParams, SnapshotQuery};

/// Environment-derived defaults the resolver falls back to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotDefaults {
    /// Hard ceiling; request overrides can lower it but never raise it
    pub max_count: usize,
    pub regen_seconds: u64,
    pub match_ratio: f64,
    pub drivers: Option<usize>,
    pub users: Option<usize>,
    pub seed: Option<u64>,
    pub bounds: BoundingBox,
}

impl Default for SnapshotDefaults {
    fn default() -> Self {
        Self {
            max_count: crate::core::generator::DEFAULT_MAX_COUNT,
            regen_seconds: 20,
            match_ratio: 0.7,
            drivers: None,
            users: None,
            seed: None,
            bounds: BoundingBox::default(),
        }
    }
}

impl SnapshotDefaults {
    /// Parameters used when no request overrides anything
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            driver_count: self.drivers,
            user_count: self.users,
            max_count: self.max_count,
            match_ratio: self.match_ratio,
            regen_seconds: self.regen_seconds,
            seed: self.seed,
            force: false,
            include_meta: false,
            bounds: self.bounds,
        }
    }
}

/// Overrides after parsing, before range checks
#[derive(Debug, Default, Validate)]
struct ParsedOverrides {
    drivers: Option<usize>,
    users: Option<usize>,
    #[validate(range(min = 1))]
    max_count: Option<usize>,
    #[validate(range(min = 1))]
    regen_seconds: Option<u64>,
    #[validate(range(min = 0.0, max = 1.0))]
    match_ratio: Option<f64>,
    seed: Option<u64>,
    force: bool,
    meta: bool,
}

/// Build one validated [`GenerationParams`] from request overrides and defaults.
///
/// Either every present override is accepted or the call fails with
/// `InvalidParameter` naming the first offending field; nothing is applied
/// partially.
pub fn resolve(
    overrides: &SnapshotQuery,
    defaults: &SnapshotDefaults,
) -> Result<GenerationParams, SnapshotError> {
    let parsed = ParsedOverrides {
        drivers: parse_count("drivers", &overrides.drivers)?,
        users: parse_count("users", &overrides.users)?,
        max_count: parse_count("max_count", &overrides.max_count)?,
        regen_seconds: parse_seconds("regen_seconds", &overrides.regen_seconds)?,
        match_ratio: parse_ratio("match_ratio", &overrides.match_ratio)?,
        seed: parse_seed("seed", &overrides.seed)?,
        force: parse_flag("force", &overrides.force)?,
        meta: parse_flag("meta", &overrides.meta)?,
    };

    if let Err(errors) = parsed.validate() {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        let field = fields.into_iter().next().unwrap_or_else(|| "query".to_string());
        let message = match field.as_str() {
            "match_ratio" => "must be within [0, 1]",
            _ => "must be at least 1",
        };
        return Err(SnapshotError::invalid(field, message));
    }

    let max_count = match parsed.max_count {
        Some(requested) if requested > defaults.max_count => {
            return Err(SnapshotError::invalid(
                "max_count",
                format!("{} exceeds the configured ceiling of {}", requested, defaults.max_count),
            ));
        }
        Some(requested) => requested,
        None => defaults.max_count,
    };

    let driver_count = parsed.drivers.or(defaults.drivers);
    let user_count = parsed.users.or(defaults.users);

    let counts = [
        ("drivers", driver_count, parsed.drivers.is_some()),
        ("users", user_count, parsed.users.is_some()),
    ];
    for (field, count, requested) in counts {
        let Some(count) = count.filter(|&c| c > max_count) else {
            continue;
        };
        // A configured count only conflicts because the request lowered max_count
        let error = if requested {
            SnapshotError::invalid(field, format!("{} exceeds the maximum of {}", count, max_count))
        } else {
            SnapshotError::invalid(
                "max_count",
                format!("{} is below the configured {} count of {}", max_count, field, count),
            )
        };
        return Err(error);
    }

    Ok(GenerationParams {
        driver_count,
        user_count,
        max_count,
        match_ratio: parsed.match_ratio.unwrap_or(defaults.match_ratio),
        regen_seconds: parsed.regen_seconds.unwrap_or(defaults.regen_seconds),
        seed: parsed.seed.or(defaults.seed),
        force: parsed.force,
        include_meta: parsed.meta,
        bounds: defaults.bounds,
    })
}

/// Empty values count as absent
fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_count(field: &str, raw: &Option<String>) -> Result<Option<usize>, SnapshotError> {
    present(raw)
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                SnapshotError::invalid(field, format!("`{}` is not a non-negative integer", v))
            })
        })
        .transpose()
}

fn parse_seconds(field: &str, raw: &Option<String>) -> Result<Option<u64>, SnapshotError> {
    present(raw)
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                SnapshotError::invalid(field, format!("`{}` is not a positive integer", v))
            })
        })
        .transpose()
}

fn parse_ratio(field: &str, raw: &Option<String>) -> Result<Option<f64>, SnapshotError> {
    present(raw)
        .map(|v| match v.parse::<f64>() {
            Ok(ratio) if ratio.is_finite() => Ok(ratio),
            _ => Err(SnapshotError::invalid(field, format!("`{}` is not a number", v))),
        })
        .transpose()
}

/// Seeds accept the full u64 range and negative i64 values (reinterpreted bitwise)
fn parse_seed(field: &str, raw: &Option<String>) -> Result<Option<u64>, SnapshotError> {
    present(raw)
        .map(|v| {
            v.parse::<u64>()
                .or_else(|_| v.parse::<i64>().map(|s| s as u64))
                .map_err(|_| SnapshotError::invalid(field, format!("`{}` is not an integer", v)))
        })
        .transpose()
}

fn parse_flag(field: &str, raw: &Option<String>) -> Result<bool, SnapshotError> {
    let Some(v) = present(raw) else {
        return Ok(false);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(SnapshotError::invalid(field, format!("`{}` is not a boolean", v))),
    }
}
