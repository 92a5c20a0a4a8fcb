//! In-memory job store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::model::OptimizationResult;
use crate::traits::JobStore;

/// Keeps results in a map guarded by an `RwLock`.
///
/// A poisoned lock surfaces as [`StoreError::Poisoned`]; callers treat that
/// like any other persistence failure.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, OptimizationResult>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn save(&self, result: &OptimizationResult) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::Poisoned)?;
        jobs.insert(result.job_id.clone(), result.clone());
        Ok(())
    }

    fn find_by_id(&self, job_id: &str) -> Result<Option<OptimizationResult>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(jobs.get(job_id).cloned())
    }

    fn find_by_user_id(&self, user_id: &str) -> Result<Vec<OptimizationResult>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<OptimizationResult> = jobs
            .values()
            .filter(|job| job.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.job_id.cmp(&b.job_id)));
        Ok(found)
    }

    fn delete_by_id(&self, job_id: &str) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::Poisoned)?;
        Ok(jobs.remove(job_id).is_some())
    }
}
