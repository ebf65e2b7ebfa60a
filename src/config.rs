use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

use crate::core::SnapshotDefaults;
use crate::models::BoundingBox;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SnapshotSettings {
    #[serde(default = "default_max_count")]
    #[validate(range(min = 1))]
    pub max_count: usize,
    #[serde(default = "default_regen_seconds")]
    #[validate(range(min = 1))]
    pub regen_seconds: u64,
    #[serde(default = "default_match_ratio")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub match_ratio: f64,
    #[serde(default = "default_match_jitter")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub match_jitter: f64,
    pub drivers: Option<usize>,
    pub users: Option<usize>,
    pub seed: Option<u64>,
    #[serde(default = "default_true")]
    pub background_refresh: bool,
    #[serde(default)]
    pub bounds: BoundingBox,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            regen_seconds: default_regen_seconds(),
            match_ratio: default_match_ratio(),
            match_jitter: default_match_jitter(),
            drivers: None,
            users: None,
            seed: None,
            background_refresh: true,
            bounds: BoundingBox::default(),
        }
    }
}

fn default_max_count() -> usize { crate::core::DEFAULT_MAX_COUNT }
fn default_regen_seconds() -> u64 { 20 }
fn default_match_ratio() -> f64 { 0.7 }
fn default_match_jitter() -> f64 { crate::core::DEFAULT_MATCH_JITTER }
fn default_true() -> bool { true }

impl SnapshotSettings {
    /// Check ranges the types cannot express
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Message(format!("invalid snapshot settings: {}", e)))?;

        if !self.bounds.is_valid() {
            return Err(ConfigError::Message(format!(
                "invalid snapshot bounds: {:?}",
                self.bounds
            )));
        }
        for (name, count) in [("drivers", self.drivers), ("users", self.users)] {
            if let Some(count) = count {
                if count > self.max_count {
                    return Err(ConfigError::Message(format!(
                        "snapshot.{} ({}) exceeds snapshot.max_count ({})",
                        name, count, self.max_count
                    )));
                }
            }
        }
        Ok(())
    }

    /// Defaults handed to the parameter resolver
    pub fn defaults(&self) -> SnapshotDefaults {
        SnapshotDefaults {
            max_count: self.max_count,
            regen_seconds: self.regen_seconds,
            match_ratio: self.match_ratio,
            drivers: self.drivers,
            users: self.users,
            seed: self.seed,
            bounds: self.bounds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "default_true")]
    pub allow_all_origins: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allow_all_origins: true,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Output layout of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LoggingSettings {
    /// Unknown names fall back to compact text
    pub fn log_format(&self) -> LogFormat {
        match self.format.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with DISPATCH_)
    /// 4. Legacy flat variables (SNAPSHOT_*, CORS_*)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // e.g., DISPATCH__SNAPSHOT__MAX_COUNT -> snapshot.max_count
            .add_source(dispatch_environment())
            .build()?;

        settings = apply_legacy_env(settings, |name| std::env::var(name).ok())?;

        let settings: Settings = settings.try_deserialize()?;
        settings.snapshot.check()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(dispatch_environment())
            .build()?
            .try_deserialize()?;

        settings.snapshot.check()?;
        Ok(settings)
    }
}

fn dispatch_environment() -> Environment {
    Environment::with_prefix("DISPATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
}

/// Map the flat legacy deployment variables onto config keys
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SNAPSHOT_MAX_COUNT", "snapshot.max_count"),
    ("SNAPSHOT_REGEN_SECONDS", "snapshot.regen_seconds"),
    ("SNAPSHOT_MATCH_RATIO", "snapshot.match_ratio"),
    ("SNAPSHOT_MIN_LAT", "snapshot.bounds.min_lat"),
    ("SNAPSHOT_MAX_LAT", "snapshot.bounds.max_lat"),
    ("SNAPSHOT_MIN_LNG", "snapshot.bounds.min_lng"),
    ("SNAPSHOT_MAX_LNG", "snapshot.bounds.max_lng"),
];

/// Apply legacy variables as overrides; `lookup` reads the environment
fn apply_legacy_env<F>(settings: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder().add_source(settings);

    for (var, key) in LEGACY_ENV {
        if let Some(value) = lookup(var) {
            builder = builder.set_override(*key, value)?;
        }
    }

    if let Some(value) = lookup("CORS_ALLOW_ALL_ORIGINS") {
        builder = builder.set_override("cors.allow_all_origins", value.trim() == "1")?;
    }
    if let Some(value) = lookup("CORS_ALLOWED_ORIGINS") {
        let origins: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        builder = builder.set_override("cors.allowed_origins", origins)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty() -> Config {
        Config::builder().build().unwrap()
    }

    #[test]
    fn test_defaults_deserialize_from_empty_config() {
        let settings: Settings = empty().try_deserialize().unwrap();

        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.snapshot.max_count, 1000);
        assert_eq!(settings.snapshot.regen_seconds, 20);
        assert_eq!(settings.snapshot.match_ratio, 0.7);
        assert!(settings.snapshot.background_refresh);
        assert_eq!(settings.snapshot.bounds, BoundingBox::default());
        assert!(settings.cors.allow_all_origins);
        settings.snapshot.check().unwrap();
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
        assert_eq!(LoggingSettings::default().log_format(), LogFormat::Json);
    }

    #[test]
    fn test_log_format_names() {
        let with = |format: &str| LoggingSettings {
            format: format.to_string(),
            ..LoggingSettings::default()
        };
        assert_eq!(with("JSON").log_format(), LogFormat::Json);
        assert_eq!(with("pretty").log_format(), LogFormat::Pretty);
        assert_eq!(with("compact").log_format(), LogFormat::Compact);
        assert_eq!(with("plain").log_format(), LogFormat::Compact);
    }

    #[test]
    fn test_legacy_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SNAPSHOT_MAX_COUNT", "200"),
            ("SNAPSHOT_MATCH_RATIO", "0.5"),
            ("SNAPSHOT_MIN_LAT", "10.5"),
            ("CORS_ALLOW_ALL_ORIGINS", "0"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:5173, http://127.0.0.1:5173"),
        ]);

        let config = apply_legacy_env(empty(), |name| vars.get(name).map(|v| v.to_string())).unwrap();
        let settings: Settings = config.try_deserialize().unwrap();

        assert_eq!(settings.snapshot.max_count, 200);
        assert_eq!(settings.snapshot.match_ratio, 0.5);
        assert_eq!(settings.snapshot.bounds.min_lat, 10.5);
        assert!(!settings.cors.allow_all_origins);
        assert_eq!(
            settings.cors.allowed_origins,
            vec!["http://localhost:5173".to_string(), "http://127.0.0.1:5173".to_string()]
        );
    }

    #[test]
    fn test_check_rejects_bad_ratio() {
        let snapshot = SnapshotSettings {
            match_ratio: 1.5,
            ..SnapshotSettings::default()
        };
        assert!(snapshot.check().is_err());
    }

    #[test]
    fn test_check_rejects_default_count_above_ceiling() {
        let snapshot = SnapshotSettings {
            max_count: 10,
            drivers: Some(11),
            ..SnapshotSettings::default()
        };
        assert!(snapshot.check().is_err());
    }

    #[test]
    fn test_check_rejects_off_globe_bounds() {
        let snapshot = SnapshotSettings {
            bounds: BoundingBox {
                min_lat: -1e308,
                max_lat: 1e308,
                ..BoundingBox::default()
            },
            ..SnapshotSettings::default()
        };
        assert!(snapshot.check().is_err());
    }

    #[test]
    fn test_settings_to_defaults() {
        let snapshot = SnapshotSettings {
            seed: Some(4),
            ..SnapshotSettings::default()
        };
        let defaults = snapshot.defaults();
        assert_eq!(defaults.seed, Some(4));
        assert_eq!(defaults.max_count, snapshot.max_count);
    }
}
