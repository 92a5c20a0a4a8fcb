//! JSON request/response boundary.
//!
//! Payloads are parsed into typed inputs, converted into domain types with
//! full validation, and every handler answers with an HTTP-style status plus
//! an [`ApiResponse`] envelope.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{StoreError, ValidationError};
use crate::model::{
    Algorithm, Constraints, Coordinates, OptimizationRequest, OptimizationResult, OptimizeOptions, Place,
    TimeWindow, TravelMode, DEFAULT_PRIORITY, DEFAULT_PRIORITY_WEIGHTING, DEFAULT_VISIT_MINUTES, parse_start_time,
};
use crate::orchestrator::{AlgorithmComparison, InsertionOutcome, OptimizationOrchestrator};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindowInput {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInput {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub priority: Option<i64>,
    pub visit_duration: Option<i64>,
    pub time_window: Option<TimeWindowInput>,
}

impl TryFrom<PlaceInput> for Place {
    type Error = ValidationError;

    fn try_from(input: PlaceInput) -> Result<Self, Self::Error> {
        let priority = input.priority.unwrap_or(i64::from(DEFAULT_PRIORITY));
        let priority = u8::try_from(priority).map_err(|_| ValidationError::InvalidPriority {
            id: input.id.clone(),
            priority,
        })?;
        let minutes = input.visit_duration.unwrap_or(i64::from(DEFAULT_VISIT_MINUTES));
        let visit_duration = u32::try_from(minutes).map_err(|_| ValidationError::InvalidVisitDuration {
            id: input.id.clone(),
            minutes,
        })?;

        let name = if input.name.is_empty() { input.id.clone() } else { input.name };
        let mut place = Place::new(input.id, name, input.lat, input.lng)
            .with_priority(priority)
            .with_visit_duration(visit_duration);
        if let Some(window) = input.time_window {
            place = place.with_time_window(TimeWindow::parse(&window.open, &window.close)?);
        }
        place.validate()?;
        Ok(place)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsInput {
    pub start_location: Option<Coordinates>,
    pub start_time: Option<String>,
    pub time_budget_minutes: Option<u32>,
    #[serde(default)]
    pub travel_types: Vec<String>,
    pub budget: Option<f64>,
}

impl ConstraintsInput {
    fn into_constraints(self, strict_budget: bool) -> Result<Constraints, ValidationError> {
        if self.travel_types.is_empty() {
            return Err(ValidationError::EmptyTravelTypes);
        }
        let travel_types = self
            .travel_types
            .iter()
            .map(|name| name.parse::<TravelMode>())
            .collect::<Result<Vec<_>, _>>()?;
        let start_time = self.start_time.as_deref().map(parse_start_time).transpose()?;

        Ok(Constraints {
            start_location: self.start_location,
            start_time,
            time_budget_minutes: self.time_budget_minutes,
            travel_types,
            budget: self.budget,
            strict_budget,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsInput {
    #[serde(default)]
    pub include_realtime_transit: bool,
    pub algorithm: Option<String>,
    pub priority_weighting: Option<f64>,
    #[serde(default)]
    pub strict_budget: bool,
    #[serde(default)]
    pub multi_modal: bool,
    pub seed: Option<u64>,
}

impl TryFrom<OptionsInput> for OptimizeOptions {
    type Error = ValidationError;

    fn try_from(input: OptionsInput) -> Result<Self, Self::Error> {
        let algorithm = match input.algorithm.as_deref() {
            Some(name) => name.parse::<Algorithm>()?,
            None => Algorithm::default(),
        };
        Ok(OptimizeOptions {
            algorithm,
            priority_weighting: input.priority_weighting.unwrap_or(DEFAULT_PRIORITY_WEIGHTING),
            multi_modal: input.multi_modal,
            include_realtime_transit: input.include_realtime_transit,
            seed: input.seed,
        })
    }
}

/// Body of `POST /optimize-route` and `POST /compare-algorithms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub user_id: Option<String>,
    pub places: Vec<PlaceInput>,
    pub constraints: ConstraintsInput,
    #[serde(default)]
    pub options: OptionsInput,
}

impl TryFrom<OptimizeRouteRequest> for OptimizationRequest {
    type Error = ValidationError;

    fn try_from(input: OptimizeRouteRequest) -> Result<Self, Self::Error> {
        let places = input
            .places
            .into_iter()
            .map(Place::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = input.constraints.into_constraints(input.options.strict_budget)?;
        let options = OptimizeOptions::try_from(input.options)?;

        let request = OptimizationRequest {
            user_id: input.user_id,
            places,
            constraints,
            options,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Body of `POST /insert-attraction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAttractionRequest {
    pub existing_places: Vec<PlaceInput>,
    pub new_place: PlaceInput,
    pub constraints: ConstraintsInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedJob {
    pub job_id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Milliseconds spent in the handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply<T> {
    pub status: u16,
    pub body: ApiResponse<T>,
}

impl<T> ApiReply<T> {
    fn ok(data: T, started: Instant) -> Self {
        Self {
            status: STATUS_OK,
            body: ApiResponse {
                success: true,
                data: Some(data),
                processing_time: Some(started.elapsed().as_millis() as u64),
                error: None,
                details: None,
            },
        }
    }

    fn failure(status: u16, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ApiResponse {
                success: false,
                data: None,
                processing_time: None,
                error: Some(error.into()),
                details,
            },
        }
    }

    fn invalid(err: ValidationError) -> Self {
        warn!(error = %err, "request rejected");
        Self::failure(STATUS_BAD_REQUEST, "Validation failed", Some(err.to_string()))
    }

    fn internal(err: StoreError) -> Self {
        error!(error = %err, "job store request failed");
        Self::failure(STATUS_INTERNAL_ERROR, "Internal server error", Some(err.to_string()))
    }

    fn not_found(job_id: &str) -> Self {
        Self::failure(STATUS_NOT_FOUND, "Job not found", Some(format!("no job with id `{job_id}`")))
    }
}

impl<T: Serialize> ApiReply<T> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.body)
    }
}

fn parse_body<B: DeserializeOwned, T>(body: &str) -> Result<B, ApiReply<T>> {
    serde_json::from_str(body).map_err(|err| {
        warn!(error = %err, "malformed request body");
        ApiReply::failure(STATUS_BAD_REQUEST, "Invalid request body", Some(err.to_string()))
    })
}

pub fn optimize_route(
    orchestrator: &OptimizationOrchestrator,
    request: OptimizeRouteRequest,
) -> ApiReply<OptimizationResult> {
    let started = Instant::now();
    let request = match OptimizationRequest::try_from(request) {
        Ok(request) => request,
        Err(err) => return ApiReply::invalid(err),
    };
    match orchestrator.optimize(&request) {
        Ok(result) => ApiReply::ok(result, started),
        Err(err) => ApiReply::invalid(err),
    }
}

pub fn optimize_route_json(orchestrator: &OptimizationOrchestrator, body: &str) -> ApiReply<OptimizationResult> {
    match parse_body(body) {
        Ok(request) => optimize_route(orchestrator, request),
        Err(reply) => reply,
    }
}

pub fn insert_attraction(
    orchestrator: &OptimizationOrchestrator,
    request: InsertAttractionRequest,
) -> ApiReply<InsertionOutcome> {
    let started = Instant::now();
    let outcome = insertion_inputs(request).and_then(|(existing, new_place, constraints)| {
        orchestrator.insert_place(&existing, new_place, &constraints)
    });
    match outcome {
        Ok(outcome) => ApiReply::ok(outcome, started),
        Err(err) => ApiReply::invalid(err),
    }
}

fn insertion_inputs(request: InsertAttractionRequest) -> Result<(Vec<Place>, Place, Constraints), ValidationError> {
    let existing = request
        .existing_places
        .into_iter()
        .map(Place::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let new_place = Place::try_from(request.new_place)?;
    let constraints = request.constraints.into_constraints(false)?;
    Ok((existing, new_place, constraints))
}

pub fn insert_attraction_json(orchestrator: &OptimizationOrchestrator, body: &str) -> ApiReply<InsertionOutcome> {
    match parse_body(body) {
        Ok(request) => insert_attraction(orchestrator, request),
        Err(reply) => reply,
    }
}

pub fn compare_algorithms(
    orchestrator: &OptimizationOrchestrator,
    request: OptimizeRouteRequest,
) -> ApiReply<Vec<AlgorithmComparison>> {
    let started = Instant::now();
    let outcome = OptimizationRequest::try_from(request).and_then(|request| orchestrator.compare_algorithms(&request));
    match outcome {
        Ok(rows) => ApiReply::ok(rows, started),
        Err(err) => ApiReply::invalid(err),
    }
}

pub fn compare_algorithms_json(
    orchestrator: &OptimizationOrchestrator,
    body: &str,
) -> ApiReply<Vec<AlgorithmComparison>> {
    match parse_body(body) {
        Ok(request) => compare_algorithms(orchestrator, request),
        Err(reply) => reply,
    }
}

pub fn get_job(orchestrator: &OptimizationOrchestrator, job_id: &str) -> ApiReply<OptimizationResult> {
    let started = Instant::now();
    match orchestrator.job(job_id) {
        Ok(Some(result)) => ApiReply::ok(result, started),
        Ok(None) => ApiReply::not_found(job_id),
        Err(err) => ApiReply::internal(err),
    }
}

pub fn get_user_jobs(orchestrator: &OptimizationOrchestrator, user_id: &str) -> ApiReply<Vec<OptimizationResult>> {
    let started = Instant::now();
    match orchestrator.jobs_for_user(user_id) {
        Ok(results) => ApiReply::ok(results, started),
        Err(err) => ApiReply::internal(err),
    }
}

pub fn delete_job(orchestrator: &OptimizationOrchestrator, job_id: &str) -> ApiReply<DeletedJob> {
    let started = Instant::now();
    match orchestrator.delete_job(job_id) {
        Ok(true) => ApiReply::ok(
            DeletedJob {
                job_id: job_id.to_string(),
                deleted: true,
            },
            started,
        ),
        Ok(false) => ApiReply::not_found(job_id),
        Err(err) => ApiReply::internal(err),
    }
}
