//! Haversine distance matrix provider (fallback when no routing service).
//!
//! Uses great-circle distance and a per-mode average speed to estimate
//! travel time. Less accurate than a road network but always available.

use crate::error::ProviderError;
use crate::matrix::{DistanceMatrix, Leg};
use crate::model::{Coordinates, TravelMode};
use crate::traits::DistanceProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineProvider;

impl HaversineProvider {
    /// Haversine distance between two points in meters.
    pub fn haversine_meters(from: Coordinates, to: Coordinates) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lng = (to.lng - from.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_KM * c * 1000.0
    }

    /// Travel time in seconds for `distance_meters` at the mode's speed.
    pub fn estimate_seconds(distance_meters: f64, mode: TravelMode) -> f64 {
        let hours = distance_meters / 1000.0 / mode.speed_kmh();
        hours * 3600.0
    }

    /// Each unordered pair is computed once and mirrored, so the matrix is
    /// exactly symmetric.
    pub fn compute(&self, locations: &[Coordinates], mode: TravelMode) -> DistanceMatrix {
        let n = locations.len();
        let mut matrix = DistanceMatrix::zeros(n);

        for i in 0..n {
            for j in (i + 1)..n {
                let meters = Self::haversine_meters(locations[i], locations[j]);
                let leg = Leg::new(meters, Self::estimate_seconds(meters, mode));
                matrix.set(i, j, leg);
                matrix.set(j, i, leg);
            }
        }

        matrix
    }
}

impl DistanceProvider for HaversineProvider {
    fn name(&self) -> &'static str {
        "haversine"
    }

    fn matrix_for(
        &self,
        locations: &[Coordinates],
        mode: TravelMode,
    ) -> Result<DistanceMatrix, ProviderError> {
        Ok(self.compute(locations, mode))
    }
}
