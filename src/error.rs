//! Error types for the optimizer.
//!
//! Only [`ValidationError`] ever reaches a caller as a failure. Provider and
//! store errors are absorbed by the orchestrator and surface as warnings or
//! log records.

use thiserror::Error;

/// Request rejected before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least 2 places are required, got {count}")]
    TooFewPlaces { count: usize },

    #[error("travel types must not be empty")]
    EmptyTravelTypes,

    #[error("unknown travel type `{0}`")]
    UnknownTravelType(String),

    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("place `{id}` has invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { id: String, lat: f64, lng: f64 },

    #[error("start location has invalid coordinates ({lat}, {lng})")]
    InvalidStartLocation { lat: f64, lng: f64 },

    #[error("place id `{0}` is empty or reserved")]
    InvalidPlaceId(String),

    #[error("duplicate place id `{0}`")]
    DuplicatePlaceId(String),

    #[error("place `{id}` has priority {priority}; expected 1-10")]
    InvalidPriority { id: String, priority: i64 },

    #[error("place `{id}` has visit duration {minutes} min; expected at least 5")]
    InvalidVisitDuration { id: String, minutes: i64 },

    #[error("invalid time window `{open}`-`{close}`; expected HH:MM with open before close")]
    InvalidTimeWindow { open: String, close: String },

    #[error("invalid start time `{0}`; expected ISO-8601")]
    InvalidStartTime(String),

    #[error("priority weighting {0} is outside 0..=1")]
    InvalidPriorityWeighting(f64),

    #[error("budget {0} must not be negative")]
    InvalidBudget(f64),
}

/// Failure of a distance provider. Recoverable: callers fall back to the
/// great-circle estimate.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing service returned code `{0}`")]
    Service(String),

    #[error("no route between locations {from} and {to}")]
    Unroutable { from: usize, to: usize },

    #[error("matrix has {rows} rows for {expected} locations")]
    DimensionMismatch { rows: usize, expected: usize },

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure of the job store collaborator. Logged, never surfaced as a job
/// failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("job store lock poisoned")]
    Poisoned,
}
