//! Domain model: places, constraints, options and optimization results.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_PRIORITY: u8 = 5;
pub const DEFAULT_VISIT_MINUTES: u32 = 60;
pub const MIN_VISIT_MINUTES: u32 = 5;
pub const DEFAULT_PRIORITY_WEIGHTING: f64 = 0.3;

/// Identifier used for the implicit start node in segments.
pub const START_NODE_ID: &str = "start";

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Stable textual key, precise to ~0.1 m.
    pub fn key(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

/// Opening hours of a place, as minutes from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub open: u32,
    pub close: u32,
}

impl TimeWindow {
    pub fn new(open: u32, close: u32) -> Self {
        Self { open, close }
    }

    /// Parse an `HH:MM`-`HH:MM` pair. Overnight windows are rejected.
    pub fn parse(open: &str, close: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimeWindow {
            open: open.to_string(),
            close: close.to_string(),
        };
        let open_minutes = parse_hhmm(open).ok_or_else(invalid)?;
        let close_minutes = parse_hhmm(close).ok_or_else(invalid)?;
        if open_minutes >= close_minutes {
            return Err(invalid());
        }
        Ok(Self::new(open_minutes, close_minutes))
    }
}

/// Parse `HH:MM` into minutes from midnight.
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}

/// Format minutes from midnight as `HH:MM`, wrapping past midnight.
pub fn format_hhmm(minutes: u32) -> String {
    let of_day = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", of_day / 60, of_day % 60)
}

/// Parse an ISO-8601 start time. Offsets are honoured by taking the local
/// wall-clock time at that offset.
pub fn parse_start_time(value: &str) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = value.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| ValidationError::InvalidStartTime(value.to_string()))
}

/// A point of interest to visit.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    pub priority: u8,
    pub visit_duration_minutes: u32,
    pub time_window: Option<TimeWindow>,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: Coordinates::new(lat, lng),
            priority: DEFAULT_PRIORITY,
            visit_duration_minutes: DEFAULT_VISIT_MINUTES,
            time_window: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_visit_duration(mut self, minutes: u32) -> Self {
        self.visit_duration_minutes = minutes;
        self
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() || self.id == START_NODE_ID {
            return Err(ValidationError::InvalidPlaceId(self.id.clone()));
        }
        if !self.location.is_valid() {
            return Err(ValidationError::InvalidCoordinates {
                id: self.id.clone(),
                lat: self.location.lat,
                lng: self.location.lng,
            });
        }
        if !(1..=10).contains(&self.priority) {
            return Err(ValidationError::InvalidPriority {
                id: self.id.clone(),
                priority: i64::from(self.priority),
            });
        }
        if self.visit_duration_minutes < MIN_VISIT_MINUTES {
            return Err(ValidationError::InvalidVisitDuration {
                id: self.id.clone(),
                minutes: i64::from(self.visit_duration_minutes),
            });
        }
        Ok(())
    }
}

/// Transport modes a traveller may use between stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Walking,
    Cycling,
    Scooter,
    Transit,
    Bus,
    Car,
    Train,
    HighSpeedTrain,
    Flight,
}

impl TravelMode {
    pub const ALL: [TravelMode; 9] = [
        TravelMode::Walking,
        TravelMode::Cycling,
        TravelMode::Scooter,
        TravelMode::Transit,
        TravelMode::Bus,
        TravelMode::Car,
        TravelMode::Train,
        TravelMode::HighSpeedTrain,
        TravelMode::Flight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
            TravelMode::Scooter => "scooter",
            TravelMode::Transit => "transit",
            TravelMode::Bus => "bus",
            TravelMode::Car => "car",
            TravelMode::Train => "train",
            TravelMode::HighSpeedTrain => "high_speed_train",
            TravelMode::Flight => "flight",
        }
    }

    /// Average door-to-door speed used for duration estimates.
    pub fn speed_kmh(&self) -> f64 {
        match self {
            TravelMode::Walking => 5.0,
            TravelMode::Cycling => 15.0,
            TravelMode::Scooter => 18.0,
            TravelMode::Transit => 25.0,
            TravelMode::Bus => 50.0,
            TravelMode::Car => 60.0,
            TravelMode::Train => 90.0,
            TravelMode::HighSpeedTrain => 250.0,
            TravelMode::Flight => 700.0,
        }
    }

    /// Fixed fare charged per leg.
    pub fn base_fare(&self) -> f64 {
        match self {
            TravelMode::Walking | TravelMode::Cycling | TravelMode::Car => 0.0,
            TravelMode::Scooter => 1.0,
            TravelMode::Transit => 2.0,
            TravelMode::Bus => 3.0,
            TravelMode::Train => 5.0,
            TravelMode::HighSpeedTrain => 20.0,
            TravelMode::Flight => 60.0,
        }
    }

    pub fn cost_per_km(&self) -> f64 {
        match self {
            TravelMode::Walking | TravelMode::Cycling => 0.0,
            TravelMode::Scooter => 0.25,
            TravelMode::Transit => 0.10,
            TravelMode::Bus => 0.08,
            TravelMode::Car => 0.30,
            TravelMode::Train => 0.15,
            TravelMode::HighSpeedTrain => 0.20,
            TravelMode::Flight => 0.12,
        }
    }

    /// Longest leg this mode is considered practical for.
    pub fn max_range_km(&self) -> f64 {
        match self {
            TravelMode::Walking => 10.0,
            TravelMode::Scooter => 20.0,
            TravelMode::Cycling => 50.0,
            TravelMode::Transit => 80.0,
            TravelMode::Bus => 1500.0,
            TravelMode::Car => 2000.0,
            TravelMode::Train | TravelMode::HighSpeedTrain => 3000.0,
            TravelMode::Flight => f64::INFINITY,
        }
    }

    pub fn leg_cost(&self, distance_meters: f64) -> f64 {
        self.base_fare() + self.cost_per_km() * distance_meters / 1000.0
    }

    /// OSRM profile serving this mode, if the road network applies.
    pub fn osrm_profile(&self) -> Option<&'static str> {
        match self {
            TravelMode::Walking => Some("foot"),
            TravelMode::Cycling | TravelMode::Scooter => Some("bike"),
            TravelMode::Car | TravelMode::Bus => Some("car"),
            TravelMode::Transit | TravelMode::Train | TravelMode::HighSpeedTrain | TravelMode::Flight => None,
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mode = match value.trim().to_ascii_lowercase().as_str() {
            "walking" | "walk" | "foot" => TravelMode::Walking,
            "cycling" | "bike" | "bicycle" => TravelMode::Cycling,
            "scooter" | "micromobility" => TravelMode::Scooter,
            "transit" | "public_transport" | "metro" | "subway" | "tram" => TravelMode::Transit,
            "bus" => TravelMode::Bus,
            "car" | "driving" | "taxi" => TravelMode::Car,
            "train" | "rail" => TravelMode::Train,
            "high_speed_train" | "high_speed_rail" | "hsr" => TravelMode::HighSpeedTrain,
            "flight" | "plane" | "flying" => TravelMode::Flight,
            _ => return Err(ValidationError::UnknownTravelType(value.to_string())),
        };
        Ok(mode)
    }
}

/// Search strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    NearestNeighbor,
    #[default]
    Advanced,
    SimulatedAnnealing,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::NearestNeighbor,
        Algorithm::Advanced,
        Algorithm::SimulatedAnnealing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::NearestNeighbor => "nearest_neighbor",
            Algorithm::Advanced => "advanced",
            Algorithm::SimulatedAnnealing => "simulated_annealing",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "nearest_neighbor" => Ok(Algorithm::NearestNeighbor),
            "advanced" | "two_opt" => Ok(Algorithm::Advanced),
            "simulated_annealing" => Ok(Algorithm::SimulatedAnnealing),
            other => Err(ValidationError::UnknownAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    pub start_location: Option<Coordinates>,
    pub start_time: Option<NaiveDateTime>,
    pub time_budget_minutes: Option<u32>,
    pub travel_types: Vec<TravelMode>,
    pub budget: Option<f64>,
    pub strict_budget: bool,
}

impl Constraints {
    pub fn new(travel_types: Vec<TravelMode>) -> Self {
        Self {
            start_location: None,
            start_time: None,
            time_budget_minutes: None,
            travel_types,
            budget: None,
            strict_budget: false,
        }
    }

    /// Mode whose matrix drives ordering and scheduling.
    pub fn primary_mode(&self) -> TravelMode {
        self.travel_types.first().copied().unwrap_or(TravelMode::Car)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    pub algorithm: Algorithm,
    pub priority_weighting: f64,
    pub multi_modal: bool,
    pub include_realtime_transit: bool,
    pub seed: Option<u64>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            priority_weighting: DEFAULT_PRIORITY_WEIGHTING,
            multi_modal: false,
            include_realtime_transit: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub user_id: Option<String>,
    pub places: Vec<Place>,
    pub constraints: Constraints,
    pub options: OptimizeOptions,
}

impl OptimizationRequest {
    pub fn new(places: Vec<Place>, constraints: Constraints) -> Self {
        Self {
            user_id: None,
            places,
            constraints,
            options: OptimizeOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.places.len() < 2 {
            return Err(ValidationError::TooFewPlaces {
                count: self.places.len(),
            });
        }
        if self.constraints.travel_types.is_empty() {
            return Err(ValidationError::EmptyTravelTypes);
        }
        let mut seen = HashSet::new();
        for place in &self.places {
            place.validate()?;
            if !seen.insert(place.id.as_str()) {
                return Err(ValidationError::DuplicatePlaceId(place.id.clone()));
            }
        }
        if let Some(start) = self.constraints.start_location {
            if !start.is_valid() {
                return Err(ValidationError::InvalidStartLocation {
                    lat: start.lat,
                    lng: start.lng,
                });
            }
        }
        if let Some(budget) = self.constraints.budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(ValidationError::InvalidBudget(budget));
            }
        }
        let weighting = self.options.priority_weighting;
        if !(0.0..=1.0).contains(&weighting) {
            return Err(ValidationError::InvalidPriorityWeighting(weighting));
        }
        Ok(())
    }
}

/// One travel leg of the final itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub from_id: String,
    pub to_id: String,
    pub distance_meters: f64,
    pub travel_time_seconds: f64,
    pub mode: TravelMode,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDay {
    pub day: u32,
    pub date: Option<NaiveDate>,
    pub places: Vec<String>,
    pub travel_time_minutes: u32,
    pub visit_time_minutes: u32,
    pub requires_accommodation: bool,
}

impl TripDay {
    pub fn total_minutes(&self) -> u32 {
        self.travel_time_minutes + self.visit_time_minutes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ProviderDegradation,
    ConstraintConflict,
    Timeout,
}

/// Soft failure carried in the result instead of aborting the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedPlace {
    pub place_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub job_id: String,
    pub user_id: Option<String>,
    pub optimized_order: Vec<String>,
    pub segments: Vec<Segment>,
    pub total_distance_meters: f64,
    pub estimated_duration_minutes: u32,
    pub total_cost: f64,
    pub algorithm: Algorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_days: Option<Vec<TripDay>>,
    pub removed: Vec<RemovedPlace>,
    pub adjustments: Vec<String>,
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<String>,
    pub terminated_early: bool,
    pub created_at: DateTime<Utc>,
}
