//! Optimizer configuration.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::model::parse_hhmm;

/// Simulated annealing schedule.
#[derive(Debug, Clone)]
pub struct AnnealingConfig {
    /// Starting temperature, on the normalized objective scale.
    pub initial_temperature: f64,
    /// Geometric cooling factor applied every iteration.
    pub cooling_rate: f64,
    /// Search stops once the temperature drops below this.
    pub min_temperature: f64,
    pub max_iterations: usize,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 0.1,
            cooling_rate: 0.9995,
            min_temperature: 1e-4,
            max_iterations: 20_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Time of day (minutes from midnight) each trip day begins.
    pub day_start_minutes: u32,
    /// No activity may run past this time of day.
    pub day_end_minutes: u32,
    /// Opening hours assumed for places without an explicit window.
    pub default_open_minutes: u32,
    pub default_close_minutes: u32,
    /// Ceiling on travel + visit minutes per day.
    pub max_day_minutes: u32,
    /// Ceiling on travel minutes per day.
    pub max_day_travel_minutes: u32,
    pub max_two_opt_passes: usize,
    /// Instances at least this large run 2-opt passes in parallel.
    pub parallel_threshold: usize,
    pub annealing: AnnealingConfig,
    /// Wall-clock budget for the search stages of one job.
    pub max_job_duration: Duration,
    pub cache_ttl: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            day_start_minutes: 9 * 60,
            day_end_minutes: 20 * 60,
            default_open_minutes: 9 * 60,
            default_close_minutes: 18 * 60,
            max_day_minutes: 14 * 60,
            max_day_travel_minutes: 10 * 60,
            max_two_opt_passes: 1_000,
            parallel_threshold: 256,
            annealing: AnnealingConfig::default(),
            max_job_duration: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl OptimizerConfig {
    /// Defaults overridden by `ITINERARY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = read(&lookup, "ITINERARY_DAY_START", parse_hhmm) {
            config.day_start_minutes = value;
        }
        if let Some(value) = read(&lookup, "ITINERARY_DAY_END", parse_hhmm) {
            config.day_end_minutes = value;
        }
        if let Some(value) = read(&lookup, "ITINERARY_MAX_DAY_MINUTES", |v| v.parse().ok()) {
            config.max_day_minutes = value;
        }
        if let Some(value) = read(&lookup, "ITINERARY_MAX_TRAVEL_MINUTES", |v| v.parse().ok()) {
            config.max_day_travel_minutes = value;
        }
        if let Some(value) = read(&lookup, "ITINERARY_MAX_JOB_MS", |v| v.parse().ok()) {
            config.max_job_duration = Duration::from_millis(value);
        }
        if let Some(value) = read(&lookup, "ITINERARY_ANNEALING_ITERATIONS", |v| v.parse().ok()) {
            config.annealing.max_iterations = value;
        }
        if let Some(value) = read(&lookup, "ITINERARY_CACHE_TTL_SECS", |v| v.parse().ok()) {
            config.cache_ttl = Duration::from_secs(value);
        }

        if config.day_start_minutes >= config.day_end_minutes {
            warn!(
                day_start = config.day_start_minutes,
                day_end = config.day_end_minutes,
                "day start is not before day end; using defaults"
            );
            let defaults = Self::default();
            config.day_start_minutes = defaults.day_start_minutes;
            config.day_end_minutes = defaults.day_end_minutes;
        }

        config
    }
}

fn read<F, T, P>(lookup: &F, key: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparseable configuration value");
    }
    parsed
}
