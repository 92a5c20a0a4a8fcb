//! OSRM HTTP adapter for distance matrices.
//!
//! One table request is issued per source row so large matrices fan out
//! over a small, bounded worker pool. Modes without a road profile (rail,
//! air, transit) are estimated by great-circle distance.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::haversine::HaversineProvider;
use crate::matrix::{DistanceMatrix, Leg};
use crate::model::{Coordinates, TravelMode};
use crate::traits::DistanceProvider;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Maximum number of table requests in flight.
    pub concurrency: usize,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 10,
            concurrency: 4,
        }
    }
}

/// Distance provider backed by an OSRM routing service.
#[derive(Clone)]
pub struct RemoteRoutingProvider {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    pool: Arc<rayon::ThreadPool>,
}

impl RemoteRoutingProvider {
    pub fn new(config: OsrmConfig) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency.max(1))
            .thread_name(|index| format!("osrm-fetch-{index}"))
            .build()?;

        Ok(Self {
            config,
            client,
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn table_url(&self, profile: &str, coords: &str, source: usize) -> String {
        format!(
            "{}/table/v1/{}/{}?sources={}&annotations=duration,distance",
            self.config.base_url.trim_end_matches('/'),
            profile,
            coords,
            source
        )
    }

    fn fetch_row(
        &self,
        profile: &str,
        coords: &str,
        source: usize,
        expected: usize,
    ) -> Result<Vec<Leg>, ProviderError> {
        let body = self
            .client
            .get(self.table_url(profile, coords, source))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        body.into_row(source, expected)
    }
}

impl DistanceProvider for RemoteRoutingProvider {
    fn name(&self) -> &'static str {
        "osrm"
    }

    fn matrix_for(
        &self,
        locations: &[Coordinates],
        mode: TravelMode,
    ) -> Result<DistanceMatrix, ProviderError> {
        let Some(profile) = mode.osrm_profile() else {
            return Ok(HaversineProvider.compute(locations, mode));
        };
        if locations.is_empty() {
            return Ok(DistanceMatrix::zeros(0));
        }

        let coords = locations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        debug!(profile, size = locations.len(), "fetching OSRM table rows");

        let rows: Result<Vec<Vec<Leg>>, ProviderError> = self.pool.install(|| {
            (0..locations.len())
                .into_par_iter()
                .map(|source| self.fetch_row(profile, &coords, source, locations.len()))
                .collect()
        });

        let mut matrix = DistanceMatrix::from_legs(rows?)?;
        for i in 0..matrix.len() {
            matrix.set(i, i, Leg::ZERO);
        }
        Ok(matrix)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    /// Extract the single source row of a `sources=<i>` table response.
    pub(crate) fn into_row(self, source: usize, expected: usize) -> Result<Vec<Leg>, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::Service(self.code));
        }
        let durations = first_row(self.durations);
        let distances = first_row(self.distances);
        if durations.len() != expected || distances.len() != expected {
            return Err(ProviderError::DimensionMismatch {
                rows: durations.len().min(distances.len()),
                expected,
            });
        }

        durations
            .into_iter()
            .zip(distances)
            .enumerate()
            .map(|(target, pair)| match pair {
                (Some(duration), Some(distance)) => Ok(Leg::new(distance, duration)),
                _ => Err(ProviderError::Unroutable { from: source, to: target }),
            })
            .collect()
    }
}

fn first_row(table: Option<Vec<Vec<Option<f64>>>>) -> Vec<Option<f64>> {
    table
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}
