//! itinerary-optimizer core
//!
//! Orders a set of geocoded places into a multi-stop itinerary: distance
//! matrices, tour construction, local search, opening-hour scheduling,
//! day splitting and per-leg transport mode selection.

pub mod api;
pub mod annealing;
pub mod cache;
pub mod config;
pub mod construct;
pub mod days;
pub mod error;
pub mod haversine;
pub mod insertion;
pub mod local_search;
pub mod matrix;
pub mod model;
pub mod objective;
pub mod orchestrator;
pub mod osrm;
pub mod schedule;
pub mod store;
pub mod traits;
pub mod transport;

pub use config::OptimizerConfig;
pub use error::{ProviderError, StoreError, ValidationError};
pub use model::{
    Algorithm, Constraints, Coordinates, OptimizationRequest, OptimizationResult, OptimizeOptions,
    Place, TimeWindow, TravelMode,
};
pub use orchestrator::OptimizationOrchestrator;
