//! Timeline simulation with opening-hour checks.
//!
//! Conflicts never fail the job: a place that cannot be visited inside its
//! window is dropped from the itinerary with a reason, and every decision is
//! written to the adjustment log.

use tracing::debug;

use crate::config::OptimizerConfig;
use crate::matrix::DistanceMatrix;
use crate::model::{MINUTES_PER_DAY, Place, RemovedPlace, START_NODE_ID, TimeWindow, format_hhmm};

/// Scheduling view of one matrix node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub visit_minutes: u32,
    pub window: Option<TimeWindow>,
}

impl Stop {
    pub fn from_place(place: &Place) -> Self {
        Self {
            id: place.id.clone(),
            visit_minutes: place.visit_duration_minutes,
            window: place.time_window,
        }
    }

    /// Implicit start node: no visit, no window.
    pub fn starting_point() -> Self {
        Self {
            id: START_NODE_ID.to_string(),
            visit_minutes: 0,
            window: None,
        }
    }

    pub fn is_starting_point(&self) -> bool {
        self.visit_minutes == 0
    }
}

/// Concrete timing of a kept stop, in minutes since midnight of day one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledVisit {
    pub node: usize,
    pub arrival: u32,
    pub start: u32,
    pub departure: u32,
}

impl ScheduledVisit {
    /// Zero-based trip day the visit starts on.
    pub fn day_index(&self) -> u32 {
        self.start / MINUTES_PER_DAY
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub kept: Vec<usize>,
    pub visits: Vec<ScheduledVisit>,
    pub removed: Vec<RemovedPlace>,
    pub adjustments: Vec<String>,
}

/// Running totals for the trip day being filled.
#[derive(Debug, Default)]
struct DayLoad {
    visits: usize,
    travel_minutes: u32,
    activity_minutes: u32,
}

enum Decision {
    Keep { start: u32, note: String },
    Remove(String),
}

pub struct TimeWindowScheduler<'a> {
    config: &'a OptimizerConfig,
}

impl<'a> TimeWindowScheduler<'a> {
    pub fn new(config: &'a OptimizerConfig) -> Self {
        Self { config }
    }

    fn window_for(&self, stop: &Stop) -> TimeWindow {
        stop.window.unwrap_or(TimeWindow::new(
            self.config.default_open_minutes,
            self.config.default_close_minutes,
        ))
    }

    /// First day start strictly after `clock` falls due.
    fn next_day_start(&self, clock: u32) -> u32 {
        let today = (clock / MINUTES_PER_DAY) * MINUTES_PER_DAY + self.config.day_start_minutes;
        if today > clock { today } else { today + MINUTES_PER_DAY }
    }

    /// Walk `order` from `start_minutes` (minutes from midnight on day one).
    ///
    /// `stops` and `matrix` are indexed by node. A stop moves to the next
    /// day when the current day already has a visit and taking it would pass
    /// the day end or either daily ceiling, or when the day has no visit yet
    /// and the stop only fits tomorrow. Travel to a moved stop happens on the
    /// new day.
    pub fn schedule(
        &self,
        order: &[usize],
        stops: &[Stop],
        matrix: &DistanceMatrix,
        start_minutes: u32,
    ) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();
        let mut clock = start_minutes;
        let mut previous: Option<usize> = None;
        let mut day = DayLoad::default();

        for &node in order {
            let stop = &stops[node];
            let travel = previous.map_or(0, |prev| matrix.leg(prev, node).duration_minutes());
            let mut arrival = clock + travel;

            if stop.is_starting_point() {
                outcome.adjustments.push(format!(
                    "{}: starting point kept at {}",
                    stop.id,
                    format_hhmm(arrival)
                ));
                outcome.kept.push(node);
                outcome.visits.push(ScheduledVisit { node, arrival, start: arrival, departure: arrival });
                clock = arrival;
                previous = Some(node);
                continue;
            }

            let mut decision = self.decide(stop, arrival);
            let roll = if day.visits > 0 {
                self.exceeds_day(&day, clock, arrival, travel, stop.visit_minutes)
            } else {
                matches!(decision, Decision::Remove(_))
            };

            if roll {
                let next = self.next_day_start(clock);
                let moved = self.decide(stop, next + travel);
                if matches!(moved, Decision::Keep { .. }) {
                    outcome.adjustments.push(format!(
                        "{}: moved to day {} at {}",
                        stop.id,
                        next / MINUTES_PER_DAY + 1,
                        format_hhmm(next)
                    ));
                    debug!(place = %stop.id, day = next / MINUTES_PER_DAY + 1, "stop moved to next day");
                    arrival = next + travel;
                    day = DayLoad::default();
                    decision = moved;
                } else if day.visits > 0 {
                    decision = moved;
                }
            }

            match decision {
                Decision::Keep { start, note } => {
                    let departure = start + stop.visit_minutes;
                    outcome.adjustments.push(format!("{}: {}", stop.id, note));
                    outcome.kept.push(node);
                    outcome.visits.push(ScheduledVisit { node, arrival, start, departure });
                    clock = departure;
                    previous = Some(node);
                    day.visits += 1;
                    day.travel_minutes += travel;
                    day.activity_minutes += travel + stop.visit_minutes;
                }
                Decision::Remove(reason) => {
                    debug!(place = %stop.id, %reason, "place removed by time window check");
                    outcome.adjustments.push(format!("{}: removed, {}", stop.id, reason));
                    outcome.removed.push(RemovedPlace {
                        place_id: stop.id.clone(),
                        reason,
                    });
                }
            }
        }

        outcome
    }

    /// Taking the next stop today would cross midnight, pass the day end, or
    /// break the activity or travel ceiling.
    fn exceeds_day(&self, day: &DayLoad, clock: u32, arrival: u32, travel: u32, visit: u32) -> bool {
        arrival / MINUTES_PER_DAY > clock / MINUTES_PER_DAY
            || arrival % MINUTES_PER_DAY + visit > self.config.day_end_minutes
            || day.activity_minutes + travel + visit > self.config.max_day_minutes
            || day.travel_minutes + travel > self.config.max_day_travel_minutes
    }

    fn decide(&self, stop: &Stop, arrival: u32) -> Decision {
        let window = self.window_for(stop);
        let time_of_day = arrival % MINUTES_PER_DAY;
        let closes = format_hhmm(window.close);

        if time_of_day >= window.close {
            return Decision::Remove(format!("arrived after closing time; closes at {closes}"));
        }

        if time_of_day < window.open {
            if window.open + stop.visit_minutes > window.close {
                return Decision::Remove(format!("not enough time to visit; closes at {closes}"));
            }
            let wait = window.open - time_of_day;
            return Decision::Keep {
                start: arrival + wait,
                note: format!(
                    "arrived {}, waited {} min for opening at {}",
                    format_hhmm(arrival),
                    wait,
                    format_hhmm(window.open)
                ),
            };
        }

        if time_of_day + stop.visit_minutes > window.close {
            return Decision::Remove(format!("not enough time to visit; closes at {closes}"));
        }

        Decision::Keep {
            start: arrival,
            note: format!(
                "visit {}-{}",
                format_hhmm(arrival),
                format_hhmm(arrival + stop.visit_minutes)
            ),
        }
    }
}
