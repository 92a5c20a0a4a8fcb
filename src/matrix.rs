//! Distance matrices and the builder that fetches them per travel mode.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cache::DistanceCache;
use crate::error::{ProviderError, ValidationError};
use crate::haversine::HaversineProvider;
use crate::model::{Coordinates, TravelMode, Warning, WarningKind};
use crate::traits::DistanceProvider;

/// Distance and duration between two locations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Leg {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl Leg {
    pub const ZERO: Leg = Leg {
        distance_meters: 0.0,
        duration_seconds: 0.0,
    };

    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance_meters,
            duration_seconds,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        seconds_to_minutes(self.duration_seconds)
    }
}

pub fn seconds_to_minutes(seconds: f64) -> u32 {
    (seconds / 60.0).round().max(0.0) as u32
}

/// Square table of legs indexed by location order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    legs: Vec<Vec<Leg>>,
}

impl DistanceMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            legs: vec![vec![Leg::ZERO; size]; size],
        }
    }

    /// Build from rows, checking the table is square.
    pub fn from_legs(legs: Vec<Vec<Leg>>) -> Result<Self, ProviderError> {
        let expected = legs.len();
        if let Some(row) = legs.iter().find(|row| row.len() != expected) {
            return Err(ProviderError::DimensionMismatch {
                rows: row.len(),
                expected,
            });
        }
        Ok(Self { legs })
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn leg(&self, from: usize, to: usize) -> Leg {
        self.legs[from][to]
    }

    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.legs[from][to].distance_meters
    }

    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.legs[from][to].duration_seconds
    }

    pub fn set(&mut self, from: usize, to: usize, leg: Leg) {
        self.legs[from][to] = leg;
    }

    /// True when every distance equals its reverse. Road tables from a
    /// routing service are usually directed.
    pub fn is_symmetric(&self) -> bool {
        let n = self.legs.len();
        (0..n).all(|i| ((i + 1)..n).all(|j| self.distance(i, j) == self.distance(j, i)))
    }

    /// Total distance along an open path.
    pub fn path_distance(&self, order: &[usize]) -> f64 {
        order.windows(2).map(|pair| self.distance(pair[0], pair[1])).sum()
    }

    pub fn path_duration(&self, order: &[usize]) -> f64 {
        order.windows(2).map(|pair| self.duration(pair[0], pair[1])).sum()
    }
}

/// One matrix per requested travel mode over the same locations. The
/// primary matrix is always present.
#[derive(Debug, Clone)]
pub struct ModeMatrices {
    primary: TravelMode,
    primary_matrix: DistanceMatrix,
    others: HashMap<TravelMode, DistanceMatrix>,
}

impl ModeMatrices {
    pub fn new(primary: TravelMode, primary_matrix: DistanceMatrix) -> Self {
        Self {
            primary,
            primary_matrix,
            others: HashMap::new(),
        }
    }

    /// Add or replace the matrix for `mode`.
    pub fn with_mode(mut self, mode: TravelMode, matrix: DistanceMatrix) -> Self {
        if mode == self.primary {
            self.primary_matrix = matrix;
        } else {
            self.others.insert(mode, matrix);
        }
        self
    }

    pub fn primary_mode(&self) -> TravelMode {
        self.primary
    }

    /// Matrix driving ordering and scheduling.
    pub fn primary(&self) -> &DistanceMatrix {
        &self.primary_matrix
    }

    pub fn get(&self, mode: TravelMode) -> Option<&DistanceMatrix> {
        if mode == self.primary {
            Some(&self.primary_matrix)
        } else {
            self.others.get(&mode)
        }
    }

    /// Leg for `mode`, estimated from the primary distance when that mode
    /// has no matrix.
    pub fn leg(&self, mode: TravelMode, from: usize, to: usize) -> Leg {
        match self.get(mode) {
            Some(matrix) => matrix.leg(from, to),
            None => {
                let distance = self.primary_matrix.distance(from, to);
                Leg::new(distance, HaversineProvider::estimate_seconds(distance, mode))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltMatrices {
    pub matrices: ModeMatrices,
    pub warnings: Vec<Warning>,
}

/// Fetches matrices from a provider, degrading to great-circle estimates.
#[derive(Clone)]
pub struct MatrixBuilder {
    provider: Arc<dyn DistanceProvider>,
    fallback: HaversineProvider,
    cache: Option<Arc<DistanceCache>>,
}

impl MatrixBuilder {
    pub fn new(provider: Arc<dyn DistanceProvider>) -> Self {
        Self {
            provider,
            fallback: HaversineProvider,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<DistanceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a matrix for every distinct mode in `modes`; the first mode is
    /// primary. Modes are fetched concurrently.
    pub fn build(
        &self,
        locations: &[Coordinates],
        modes: &[TravelMode],
    ) -> Result<BuiltMatrices, ValidationError> {
        if locations.len() < 2 {
            return Err(ValidationError::TooFewPlaces {
                count: locations.len(),
            });
        }
        let primary = *modes.first().ok_or(ValidationError::EmptyTravelTypes)?;

        let mut distinct: Vec<TravelMode> = Vec::with_capacity(modes.len());
        for mode in modes {
            if !distinct.contains(mode) {
                distinct.push(*mode);
            }
        }

        let fetched: Vec<(TravelMode, DistanceMatrix, Option<Warning>)> = distinct
            .par_iter()
            .map(|mode| {
                let (matrix, warning) = self.matrix_for_mode(locations, *mode);
                (*mode, matrix, warning)
            })
            .collect();

        let mut warnings = Vec::new();
        let mut fetched = fetched.into_iter();
        let mut matrices = match fetched.next() {
            Some((_, matrix, warning)) => {
                warnings.extend(warning);
                ModeMatrices::new(primary, matrix)
            }
            None => return Err(ValidationError::EmptyTravelTypes),
        };
        for (mode, matrix, warning) in fetched {
            matrices = matrices.with_mode(mode, matrix);
            warnings.extend(warning);
        }

        Ok(BuiltMatrices { matrices, warnings })
    }

    fn matrix_for_mode(
        &self,
        locations: &[Coordinates],
        mode: TravelMode,
    ) -> (DistanceMatrix, Option<Warning>) {
        if let Some(cache) = &self.cache {
            if let Some(matrix) = cache.lookup_matrix(locations, mode) {
                debug!(%mode, size = locations.len(), "distance matrix served from cache");
                return (matrix, None);
            }
        }

        let fetched = self
            .provider
            .matrix_for(locations, mode)
            .and_then(|matrix| {
                if matrix.len() == locations.len() {
                    Ok(matrix)
                } else {
                    Err(ProviderError::DimensionMismatch {
                        rows: matrix.len(),
                        expected: locations.len(),
                    })
                }
            });

        match fetched {
            Ok(matrix) => {
                if let Some(cache) = &self.cache {
                    cache.store_matrix(locations, mode, &matrix);
                }
                (matrix, None)
            }
            Err(err) => {
                warn!(
                    provider = self.provider.name(),
                    %mode,
                    error = %err,
                    "distance provider failed; using great-circle estimate"
                );
                let warning = Warning::new(
                    WarningKind::ProviderDegradation,
                    format!(
                        "{} unavailable for {mode} ({err}); distances estimated by great-circle",
                        self.provider.name()
                    ),
                );
                (self.fallback.compute(locations, mode), Some(warning))
            }
        }
    }
}
