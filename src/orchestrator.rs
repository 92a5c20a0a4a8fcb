//! Staged optimization pipeline.
//!
//! A job moves through `Validating -> BuildingMatrix -> Constructing ->
//! LocalSearching -> SchedulingWindows -> SegmentingDays -> SelectingModes ->
//! Completed`. Only validation can fail; later stages degrade into warnings.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Timelike, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::annealing::anneal;
use crate::cache::DistanceCache;
use crate::config::OptimizerConfig;
use crate::construct::nearest_neighbor;
use crate::days::{DaySegmenter, DayStop};
use crate::error::{StoreError, ValidationError};
use crate::haversine::HaversineProvider;
use crate::insertion::insert_cheapest;
use crate::local_search::{TwoOptLimits, two_opt};
use crate::matrix::{BuiltMatrices, MatrixBuilder, seconds_to_minutes};
use crate::model::{
    Algorithm, Constraints, Coordinates, OptimizationRequest, OptimizationResult, OptimizeOptions, Place,
    START_NODE_ID, Warning, WarningKind,
};
use crate::objective::Objective;
use crate::schedule::{Stop, TimeWindowScheduler};
use crate::store::InMemoryJobStore;
use crate::traits::{DistanceProvider, JobStore};
use crate::transport::TransportModeSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationState {
    Validating,
    BuildingMatrix,
    Constructing,
    LocalSearching,
    SchedulingWindows,
    SegmentingDays,
    SelectingModes,
    Completed,
    Failed,
}

impl fmt::Display for OptimizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationState::Validating => "validating",
            OptimizationState::BuildingMatrix => "building_matrix",
            OptimizationState::Constructing => "constructing",
            OptimizationState::LocalSearching => "local_searching",
            OptimizationState::SchedulingWindows => "scheduling_windows",
            OptimizationState::SegmentingDays => "segmenting_days",
            OptimizationState::SelectingModes => "selecting_modes",
            OptimizationState::Completed => "completed",
            OptimizationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct JobProgress<'a> {
    job_id: &'a str,
    state: OptimizationState,
}

impl<'a> JobProgress<'a> {
    fn start(job_id: &'a str) -> Self {
        debug!(job_id, state = %OptimizationState::Validating, "optimization job created");
        Self {
            job_id,
            state: OptimizationState::Validating,
        }
    }

    fn advance(&mut self, next: OptimizationState) {
        debug!(job_id = self.job_id, from = %self.state, to = %next, "optimization state transition");
        self.state = next;
    }
}

/// One row of an algorithm comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmComparison {
    pub algorithm: Algorithm,
    pub optimized_order: Vec<String>,
    pub total_distance_meters: f64,
    pub estimated_duration_minutes: u32,
    /// Distance saved relative to nearest neighbor, in percent.
    pub improvement_percent: f64,
    pub processing_time_ms: u64,
    pub terminated_early: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionOutcome {
    pub optimized_order: Vec<String>,
    /// Index of the new place within `optimized_order`.
    pub position: usize,
    pub marginal_distance_meters: f64,
    pub total_distance_meters: f64,
    pub warnings: Vec<Warning>,
}

/// Matrix nodes for one job. With a start location node 0 is the start and
/// places follow in input order.
struct PreparedJob {
    ids: Vec<String>,
    stops: Vec<Stop>,
    priorities: Vec<u8>,
    anchor: Option<usize>,
    built: BuiltMatrices,
}

impl PreparedJob {
    fn first_node(&self) -> usize {
        self.anchor.unwrap_or(0)
    }

    fn place_ids(&self, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .filter(|node| Some(**node) != self.anchor)
            .map(|node| self.ids[*node].clone())
            .collect()
    }

    fn visit_minutes(&self, order: &[usize]) -> u32 {
        order.iter().map(|node| self.stops[*node].visit_minutes).sum()
    }
}

struct SearchOutcome {
    order: Vec<usize>,
    terminated_early: bool,
}

pub struct OptimizationOrchestrator {
    config: OptimizerConfig,
    matrix_builder: MatrixBuilder,
    store: Arc<dyn JobStore>,
}

impl OptimizationOrchestrator {
    pub fn new(
        config: OptimizerConfig,
        provider: Arc<dyn DistanceProvider>,
        store: Arc<dyn JobStore>,
        cache: Arc<DistanceCache>,
    ) -> Self {
        Self {
            config,
            matrix_builder: MatrixBuilder::new(provider).with_cache(cache),
            store,
        }
    }

    /// Great-circle distances and an in-memory store.
    pub fn with_haversine(config: OptimizerConfig) -> Self {
        let cache = Arc::new(DistanceCache::new(config.cache_ttl));
        Self::new(
            config,
            Arc::new(HaversineProvider),
            Arc::new(InMemoryJobStore::new()),
            cache,
        )
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn prepare(&self, places: &[Place], constraints: &Constraints) -> Result<PreparedJob, ValidationError> {
        let capacity = places.len() + 1;
        let mut ids = Vec::with_capacity(capacity);
        let mut stops = Vec::with_capacity(capacity);
        let mut priorities = Vec::with_capacity(capacity);
        let mut locations: Vec<Coordinates> = Vec::with_capacity(capacity);

        let anchor = constraints.start_location.map(|start| {
            ids.push(START_NODE_ID.to_string());
            stops.push(Stop::starting_point());
            priorities.push(0);
            locations.push(start);
            0
        });

        for place in places {
            ids.push(place.id.clone());
            stops.push(Stop::from_place(place));
            priorities.push(place.priority);
            locations.push(place.location);
        }

        let built = self.matrix_builder.build(&locations, &constraints.travel_types)?;
        Ok(PreparedJob {
            ids,
            stops,
            priorities,
            anchor,
            built,
        })
    }

    fn search(
        &self,
        algorithm: Algorithm,
        job: &PreparedJob,
        initial: Vec<usize>,
        options: &OptimizeOptions,
        deadline: Instant,
    ) -> SearchOutcome {
        let matrix = job.built.matrices.primary();
        match algorithm {
            Algorithm::NearestNeighbor => SearchOutcome {
                order: initial,
                terminated_early: false,
            },
            Algorithm::Advanced => {
                let limits = TwoOptLimits {
                    max_passes: self.config.max_two_opt_passes,
                    deadline: Some(deadline),
                    parallel_threshold: self.config.parallel_threshold,
                };
                let outcome = two_opt(initial, matrix, &limits);
                SearchOutcome {
                    order: outcome.order,
                    terminated_early: outcome.terminated_early,
                }
            }
            Algorithm::SimulatedAnnealing => {
                let reference = matrix.path_distance(&initial);
                let objective = Objective::new(matrix, &job.priorities, options.priority_weighting, reference);
                let seed = options.seed.unwrap_or_else(rand::random);
                let mut rng = StdRng::seed_from_u64(seed);
                let outcome = anneal(initial, &objective, &self.config.annealing, Some(deadline), &mut rng);
                SearchOutcome {
                    order: outcome.order,
                    terminated_early: outcome.terminated_early,
                }
            }
        }
    }

    fn construct(&self, job: &PreparedJob) -> Vec<usize> {
        nearest_neighbor(job.built.matrices.primary(), job.first_node(), &job.ids)
    }

    /// Run the full pipeline for one request.
    ///
    /// The result is returned synchronously and persisted in the background.
    #[tracing::instrument(level = "debug", skip(self, request), fields(places = request.places.len()))]
    pub fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult, ValidationError> {
        let started = Instant::now();
        let deadline = started + self.config.max_job_duration;
        let job_id = Uuid::new_v4().to_string();
        let mut progress = JobProgress::start(&job_id);

        if let Err(err) = request.validate() {
            progress.advance(OptimizationState::Failed);
            debug!(job_id = %job_id, error = %err, "optimization request rejected");
            return Err(err);
        }

        progress.advance(OptimizationState::BuildingMatrix);
        let constraints = &request.constraints;
        let options = &request.options;
        let job = self.prepare(&request.places, constraints)?;
        let mut warnings = job.built.warnings.clone();
        let mut suggestions = Vec::new();

        progress.advance(OptimizationState::Constructing);
        let initial = self.construct(&job);

        progress.advance(OptimizationState::LocalSearching);
        let searched = self.search(options.algorithm, &job, initial, options, deadline);
        if searched.terminated_early {
            warnings.push(Warning::new(
                WarningKind::Timeout,
                format!(
                    "{} search stopped at its time or iteration limit; returning the best order found",
                    options.algorithm
                ),
            ));
        }

        progress.advance(OptimizationState::SchedulingWindows);
        let start_minutes = constraints
            .start_time
            .map(|start| start.hour() * 60 + start.minute())
            .unwrap_or(self.config.day_start_minutes);
        let primary = job.built.matrices.primary();
        let schedule = TimeWindowScheduler::new(&self.config).schedule(&searched.order, &job.stops, primary, start_minutes);

        progress.advance(OptimizationState::SegmentingDays);
        let start_date: Option<NaiveDate> = constraints.start_time.map(|start| start.date());
        let mut day_stops = Vec::with_capacity(schedule.visits.len());
        let mut previous: Option<usize> = None;
        for visit in &schedule.visits {
            if Some(visit.node) != job.anchor {
                let travel = previous.map_or(0, |node| primary.leg(node, visit.node).duration_minutes());
                day_stops.push(
                    DayStop::new(job.ids[visit.node].clone(), travel, job.stops[visit.node].visit_minutes)
                        .on_day(visit.day_index()),
                );
            }
            previous = Some(visit.node);
        }
        let days = DaySegmenter::new(&self.config).segment(&day_stops, start_minutes, start_date);
        let trip_days = (days.len() > 1).then_some(days);

        progress.advance(OptimizationState::SelectingModes);
        let selection = TransportModeSelector::new(constraints, options.multi_modal).select(
            &schedule.kept,
            &job.ids,
            &job.built.matrices,
        );
        warnings.extend(selection.warnings);
        suggestions.extend(selection.suggestions);

        let total_distance_meters: f64 = selection.segments.iter().map(|s| s.distance_meters).sum();
        let travel_seconds: f64 = selection.segments.iter().map(|s| s.travel_time_seconds).sum();
        let estimated_duration_minutes = seconds_to_minutes(travel_seconds) + job.visit_minutes(&schedule.kept);

        if let Some(limit) = constraints.time_budget_minutes {
            if estimated_duration_minutes > limit {
                warnings.push(Warning::new(
                    WarningKind::ConstraintConflict,
                    format!("Estimated duration {estimated_duration_minutes} min exceeds time budget {limit} min"),
                ));
                suggestions.push(
                    "Remove lower-priority places or shorten visit durations to fit the time budget".to_string(),
                );
            }
        }
        if !schedule.removed.is_empty() {
            suggestions.push(format!(
                "{} place(s) could not be visited within opening hours; consider another day or start time",
                schedule.removed.len()
            ));
        }
        if options.include_realtime_transit {
            suggestions.push("Realtime transit data is not available; travel times are estimates".to_string());
        }

        let result = OptimizationResult {
            job_id: job_id.clone(),
            user_id: request.user_id.clone(),
            optimized_order: job.place_ids(&schedule.kept),
            segments: selection.segments,
            total_distance_meters,
            estimated_duration_minutes,
            total_cost: selection.total_cost,
            algorithm: options.algorithm,
            trip_days,
            removed: schedule.removed,
            adjustments: schedule.adjustments,
            warnings,
            suggestions,
            terminated_early: searched.terminated_early,
            created_at: Utc::now(),
        };

        progress.advance(OptimizationState::Completed);
        info!(
            job_id = %result.job_id,
            kept = result.optimized_order.len(),
            removed = result.removed.len(),
            distance_m = result.total_distance_meters,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "optimization completed"
        );
        self.persist(result.clone());
        Ok(result)
    }

    /// Fire-and-forget save on the rayon pool.
    fn persist(&self, result: OptimizationResult) {
        let store = Arc::clone(&self.store);
        rayon::spawn(move || {
            if let Err(err) = store.save(&result) {
                warn!(job_id = %result.job_id, error = %err, "failed to persist optimization result");
            }
        });
    }

    /// Add one place to an existing order at its cheapest position without
    /// reordering the rest.
    pub fn insert_place(
        &self,
        existing: &[Place],
        new_place: Place,
        constraints: &Constraints,
    ) -> Result<InsertionOutcome, ValidationError> {
        let mut places = existing.to_vec();
        places.push(new_place);
        OptimizationRequest::new(places.clone(), constraints.clone()).validate()?;

        let job = self.prepare(&places, constraints)?;
        let matrix = job.built.matrices.primary();
        let offset = usize::from(job.anchor.is_some());
        let candidate = offset + existing.len();

        let mut order: Vec<usize> = (offset..candidate).collect();
        let insertion = insert_cheapest(&mut order, candidate, job.anchor, matrix);
        let path: Vec<usize> = job.anchor.into_iter().chain(order.iter().copied()).collect();

        debug!(
            place = %job.ids[candidate],
            position = insertion.position,
            marginal_m = insertion.marginal_cost,
            "place inserted"
        );

        Ok(InsertionOutcome {
            optimized_order: job.place_ids(&order),
            position: insertion.position,
            marginal_distance_meters: insertion.marginal_cost,
            total_distance_meters: matrix.path_distance(&path),
            warnings: job.built.warnings,
        })
    }

    /// Run every algorithm on the same matrix.
    pub fn compare_algorithms(&self, request: &OptimizationRequest) -> Result<Vec<AlgorithmComparison>, ValidationError> {
        request.validate()?;
        let job = self.prepare(&request.places, &request.constraints)?;
        let matrix = job.built.matrices.primary();
        let initial = self.construct(&job);
        let baseline = matrix.path_distance(&initial);

        // Each algorithm gets the full search budget.
        let comparisons = Algorithm::ALL
            .iter()
            .map(|algorithm| {
                let started = Instant::now();
                let deadline = started + self.config.max_job_duration;
                let outcome = self.search(*algorithm, &job, initial.clone(), &request.options, deadline);
                let elapsed: Duration = started.elapsed();
                let distance = matrix.path_distance(&outcome.order);
                let improvement_percent = if baseline > 0.0 {
                    (baseline - distance) / baseline * 100.0
                } else {
                    0.0
                };
                AlgorithmComparison {
                    algorithm: *algorithm,
                    optimized_order: job.place_ids(&outcome.order),
                    total_distance_meters: distance,
                    estimated_duration_minutes: seconds_to_minutes(matrix.path_duration(&outcome.order))
                        + job.visit_minutes(&outcome.order),
                    improvement_percent,
                    processing_time_ms: elapsed.as_millis() as u64,
                    terminated_early: outcome.terminated_early,
                }
            })
            .collect();
        Ok(comparisons)
    }

    pub fn job(&self, job_id: &str) -> Result<Option<OptimizationResult>, StoreError> {
        self.store.find_by_id(job_id)
    }

    pub fn jobs_for_user(&self, user_id: &str) -> Result<Vec<OptimizationResult>, StoreError> {
        self.store.find_by_user_id(user_id)
    }

    pub fn delete_job(&self, job_id: &str) -> Result<bool, StoreError> {
        self.store.delete_by_id(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::matrix::{DistanceMatrix, Leg};
    use crate::model::{TimeWindow, TravelMode};

    fn orchestrator() -> OptimizationOrchestrator {
        OptimizationOrchestrator::with_haversine(OptimizerConfig::default())
    }

    fn colinear_request() -> OptimizationRequest {
        let places = vec![
            Place::new("A", "A", 0.0, 0.0),
            Place::new("C", "C", 0.0, 2.0),
            Place::new("B", "B", 0.0, 1.0),
        ];
        let mut request = OptimizationRequest::new(places, Constraints::new(vec![TravelMode::Car]));
        request.options.seed = Some(1);
        request
    }

    #[test]
    fn test_colinear_places_in_line_order() {
        let result = orchestrator().optimize(&colinear_request()).unwrap();
        assert_eq!(result.optimized_order, vec!["A", "B", "C"]);
        assert!((result.total_distance_meters - 222_390.0).abs() < 100.0);
        assert_eq!(result.segments.len(), 2);
        assert!(result.removed.is_empty());
        assert!(result.trip_days.is_none());
        assert_eq!(result.algorithm, Algorithm::Advanced);
        assert!(Uuid::parse_str(&result.job_id).is_ok());
    }

    #[test]
    fn test_validation_failure_is_returned() {
        let request = OptimizationRequest::new(
            vec![Place::new("only", "Only", 1.0, 1.0)],
            Constraints::new(vec![TravelMode::Walking]),
        );
        let err = orchestrator().optimize(&request).unwrap_err();
        assert_eq!(err, ValidationError::TooFewPlaces { count: 1 });
    }

    #[test]
    fn test_start_location_leads_segments() {
        let places = vec![
            Place::new("louvre", "Louvre", 48.8606, 2.3376),
            Place::new("orsay", "Orsay", 48.8600, 2.3266),
        ];
        let mut constraints = Constraints::new(vec![TravelMode::Walking]);
        constraints.start_location = Some(Coordinates::new(48.8584, 2.2945));
        let result = orchestrator()
            .optimize(&OptimizationRequest::new(places, constraints))
            .unwrap();

        assert_eq!(result.segments[0].from_id, START_NODE_ID);
        assert_eq!(result.optimized_order, vec!["orsay", "louvre"]);
        assert_eq!(result.segments.len(), 2);
    }

    #[test]
    fn test_window_conflict_is_soft() {
        let places = vec![
            Place::new("a", "A", 48.8606, 2.3376),
            Place::new("b", "B", 48.8600, 2.3266)
                .with_visit_duration(120)
                .with_time_window(TimeWindow::new(6 * 60, 7 * 60)),
        ];
        let request = OptimizationRequest::new(places, Constraints::new(vec![TravelMode::Walking]));
        let result = orchestrator().optimize(&request).unwrap();

        assert_eq!(result.optimized_order, vec!["a"]);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].place_id, "b");
    }

    #[test]
    fn test_realtime_transit_adds_suggestion() {
        let mut request = colinear_request();
        request.options.include_realtime_transit = true;
        let result = orchestrator().optimize(&request).unwrap();
        assert!(result.suggestions.iter().any(|s| s.contains("Realtime transit")));
    }

    #[test]
    fn test_insert_place_between_neighbors() {
        let existing = vec![
            Place::new("A", "A", 0.0, 0.0),
            Place::new("C", "C", 0.0, 2.0),
        ];
        let outcome = orchestrator()
            .insert_place(&existing, Place::new("B", "B", 0.0, 1.0), &Constraints::new(vec![TravelMode::Car]))
            .unwrap();
        assert_eq!(outcome.optimized_order, vec!["A", "B", "C"]);
        assert_eq!(outcome.position, 1);
        assert!(outcome.marginal_distance_meters.abs() < 1.0);
    }

    #[test]
    fn test_compare_algorithms_reports_every_algorithm() {
        let rows = orchestrator().compare_algorithms(&colinear_request()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].algorithm, Algorithm::NearestNeighbor);
        assert_eq!(rows[0].improvement_percent, 0.0);
        for row in &rows {
            assert_eq!(row.optimized_order.len(), 3);
        }
    }

    #[test]
    fn test_compare_algorithms_budget_is_per_algorithm() {
        let config = OptimizerConfig {
            max_job_duration: Duration::from_secs(2),
            ..OptimizerConfig::default()
        };
        let rows = OptimizationOrchestrator::with_haversine(config)
            .compare_algorithms(&colinear_request())
            .unwrap();
        for row in &rows {
            assert!(!row.terminated_early, "{} ran out of budget", row.algorithm);
            assert!(row.processing_time_ms <= 2_000);
        }
    }

    /// Every leg is 1 km and takes `minutes`.
    struct UniformProvider {
        minutes: f64,
    }

    impl DistanceProvider for UniformProvider {
        fn name(&self) -> &'static str {
            "uniform"
        }

        fn matrix_for(&self, locations: &[Coordinates], _mode: TravelMode) -> Result<DistanceMatrix, ProviderError> {
            let n = locations.len();
            let legs = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| if i == j { Leg::ZERO } else { Leg::new(1000.0, self.minutes * 60.0) })
                        .collect()
                })
                .collect();
            DistanceMatrix::from_legs(legs)
        }
    }

    #[test]
    fn test_trip_days_follow_the_schedule() {
        let config = OptimizerConfig::default();
        let orchestrator = OptimizationOrchestrator::new(
            config.clone(),
            Arc::new(UniformProvider { minutes: 210.0 }),
            Arc::new(InMemoryJobStore::new()),
            Arc::new(DistanceCache::new(config.cache_ttl)),
        );
        let places = (0..4)
            .map(|i| {
                Place::new(format!("p{i}"), format!("P{i}"), 45.0 + f64::from(i) * 0.01, 7.0)
                    .with_visit_duration(5)
                    .with_time_window(TimeWindow::new(8 * 60, 22 * 60))
            })
            .collect();
        let mut request = OptimizationRequest::new(places, Constraints::new(vec![TravelMode::Car]));
        request.options.algorithm = Algorithm::NearestNeighbor;
        let result = orchestrator.optimize(&request).unwrap();

        assert_eq!(result.optimized_order, vec!["p0", "p1", "p2", "p3"]);
        let days = result.trip_days.as_ref().expect("travel ceiling splits the trip");
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].places, vec!["p0", "p1", "p2"]);
        assert_eq!(days[0].travel_time_minutes, 420);
        assert_eq!(days[1].places, vec!["p3"]);
        assert_eq!(days[1].travel_time_minutes, 210);
        assert!(result.adjustments.iter().any(|a| a.starts_with("p3: moved to day 2")));
        assert!(!result.adjustments.iter().any(|a| a.starts_with("p3: visit 19:45")));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(OptimizationState::LocalSearching.to_string(), "local_searching");
        assert_eq!(OptimizationState::Failed.to_string(), "failed");
    }
}
