//! Process-wide distance cache shared by concurrent jobs.
//!
//! Entries are derived values keyed by coordinates and mode, so concurrent
//! writers may race freely; the last write wins.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::matrix::{DistanceMatrix, Leg};
use crate::model::{Coordinates, TravelMode};

type CacheKey = (String, String, TravelMode);

#[derive(Debug, Clone, Copy)]
struct CachedLeg {
    leg: Leg,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct DistanceCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CachedLeg>>,
}

impl DistanceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(from: Coordinates, to: Coordinates, mode: TravelMode) -> CacheKey {
        (from.key(), to.key(), mode)
    }

    fn is_fresh(&self, entry: &CachedLeg, now: Instant) -> bool {
        now.duration_since(entry.stored_at) <= self.ttl
    }

    pub fn get(&self, from: Coordinates, to: Coordinates, mode: TravelMode) -> Option<Leg> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&Self::key(from, to, mode))
            .filter(|entry| self.is_fresh(entry, Instant::now()))
            .map(|entry| entry.leg)
    }

    pub fn insert(&self, from: Coordinates, to: Coordinates, mode: TravelMode, leg: Leg) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            Self::key(from, to, mode),
            CachedLeg {
                leg,
                stored_at: Instant::now(),
            },
        );
    }

    /// Assemble a full matrix if every off-diagonal pair is cached and fresh.
    pub fn lookup_matrix(&self, locations: &[Coordinates], mode: TravelMode) -> Option<DistanceMatrix> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let mut matrix = DistanceMatrix::zeros(locations.len());

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i == j {
                    continue;
                }
                let entry = entries
                    .get(&Self::key(*from, *to, mode))
                    .filter(|entry| self.is_fresh(entry, now))?;
                matrix.set(i, j, entry.leg);
            }
        }

        Some(matrix)
    }

    pub fn store_matrix(&self, locations: &[Coordinates], mode: TravelMode, matrix: &DistanceMatrix) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    entries.insert(
                        Self::key(*from, *to, mode),
                        CachedLeg {
                            leg: matrix.leg(i, j),
                            stored_at: now,
                        },
                    );
                }
            }
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
