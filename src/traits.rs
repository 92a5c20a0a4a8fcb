//! Collaborator seams for the optimizer.
//!
//! The orchestrator depends only on these traits; concrete providers and
//! stores are chosen at construction time.

use crate::error::{ProviderError, StoreError};
use crate::matrix::DistanceMatrix;
use crate::model::{Coordinates, OptimizationResult, TravelMode};

/// Provides a distance/duration matrix for a set of locations.
///
/// The matrix is indexed by the provided location order and must be square
/// with a zero diagonal.
pub trait DistanceProvider: Send + Sync {
    /// Short name used in logs and warnings.
    fn name(&self) -> &'static str;

    fn matrix_for(
        &self,
        locations: &[Coordinates],
        mode: TravelMode,
    ) -> Result<DistanceMatrix, ProviderError>;
}

/// Persists optimization results, keyed by job id and user id.
pub trait JobStore: Send + Sync {
    fn save(&self, result: &OptimizationResult) -> Result<(), StoreError>;

    fn find_by_id(&self, job_id: &str) -> Result<Option<OptimizationResult>, StoreError>;

    /// All results for a user, newest first.
    fn find_by_user_id(&self, user_id: &str) -> Result<Vec<OptimizationResult>, StoreError>;

    /// Returns `true` if a result was removed.
    fn delete_by_id(&self, job_id: &str) -> Result<bool, StoreError>;
}
