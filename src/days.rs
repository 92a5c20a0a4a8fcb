//! Calendar-day split of a scheduled itinerary.

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::config::OptimizerConfig;
use crate::model::TripDay;

/// One kept place as seen by the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub struct DayStop {
    pub id: String,
    /// Travel from the previous kept node, including the start location.
    pub travel_minutes: u32,
    pub visit_minutes: u32,
    /// Zero-based calendar day the scheduler placed this stop on.
    pub scheduled_day: Option<u32>,
}

impl DayStop {
    pub fn new(id: impl Into<String>, travel_minutes: u32, visit_minutes: u32) -> Self {
        Self {
            id: id.into(),
            travel_minutes,
            visit_minutes,
            scheduled_day: None,
        }
    }

    pub fn on_day(mut self, day_index: u32) -> Self {
        self.scheduled_day = Some(day_index);
        self
    }

    fn minutes(&self) -> u32 {
        self.travel_minutes + self.visit_minutes
    }
}

pub struct DaySegmenter<'a> {
    config: &'a OptimizerConfig,
}

impl<'a> DaySegmenter<'a> {
    pub fn new(config: &'a OptimizerConfig) -> Self {
        Self { config }
    }

    fn open_day(&self, day: u32, offset: u32, start_date: Option<NaiveDate>) -> TripDay {
        TripDay {
            day,
            date: start_date.and_then(|date| date.checked_add_days(Days::new(u64::from(offset)))),
            places: Vec::new(),
            travel_time_minutes: 0,
            visit_time_minutes: 0,
            requires_accommodation: false,
        }
    }

    /// Split `stops` into days. Day one begins at `first_day_start`
    /// (minutes from midnight); later days begin at the configured day start.
    ///
    /// Stops carrying a scheduled day open that calendar day. A single stop
    /// longer than the daily ceiling still gets a day of its own rather than
    /// being dropped.
    pub fn segment(
        &self,
        stops: &[DayStop],
        first_day_start: u32,
        start_date: Option<NaiveDate>,
    ) -> Vec<TripDay> {
        let mut days = Vec::new();
        let mut offset = 0;
        let mut current = self.open_day(1, offset, start_date);
        let mut clock = first_day_start;

        for stop in stops {
            let scheduled = stop.scheduled_day.filter(|day| *day > offset);
            let split = !current.places.is_empty() && (scheduled.is_some() || self.exceeds_ceiling(&current, stop, clock));

            if scheduled.is_some() || split {
                offset = scheduled.unwrap_or(offset + 1);
                clock = self.config.day_start_minutes;
                if current.places.is_empty() {
                    current.date = self.open_day(current.day, offset, start_date).date;
                } else {
                    let next = current.day + 1;
                    debug!(day = current.day, places = current.places.len(), "closing trip day");
                    days.push(std::mem::replace(&mut current, self.open_day(next, offset, start_date)));
                }
            }

            current.places.push(stop.id.clone());
            current.travel_time_minutes += stop.travel_minutes;
            current.visit_time_minutes += stop.visit_minutes;
            clock += stop.minutes();
        }

        if !current.places.is_empty() {
            days.push(current);
        }

        let last = days.len().saturating_sub(1);
        for day in days.iter_mut().take(last) {
            day.requires_accommodation = true;
        }
        days
    }

    fn exceeds_ceiling(&self, day: &TripDay, stop: &DayStop, clock: u32) -> bool {
        day.total_minutes() + stop.minutes() > self.config.max_day_minutes
            || day.travel_time_minutes + stop.travel_minutes > self.config.max_day_travel_minutes
            || clock + stop.minutes() > self.config.day_end_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(legs: &[(u32, u32)]) -> Vec<DayStop> {
        legs.iter()
            .enumerate()
            .map(|(i, (travel, visit))| DayStop::new(format!("p{i}"), *travel, *visit))
            .collect()
    }

    fn flatten(days: &[TripDay]) -> Vec<String> {
        days.iter().flat_map(|d| d.places.iter().cloned()).collect()
    }

    #[test]
    fn test_short_itinerary_is_one_day() {
        let config = OptimizerConfig::default();
        let input = stops(&[(10, 60), (20, 90), (15, 45)]);
        let days = DaySegmenter::new(&config).segment(&input, 540, None);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].travel_time_minutes, 45);
        assert_eq!(days[0].visit_time_minutes, 195);
        assert!(!days[0].requires_accommodation);
        assert_eq!(days[0].date, None);
    }

    #[test]
    fn test_day_end_splits_and_preserves_order() {
        let config = OptimizerConfig::default();
        // Four 4 h stops from 09:00 cannot all end before 20:00.
        let input = stops(&[(30, 240), (30, 240), (30, 240), (30, 240)]);
        let start = NaiveDate::from_ymd_opt(2024, 6, 1);
        let days = DaySegmenter::new(&config).segment(&input, 540, start);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].places, vec!["p0", "p1"]);
        assert!(days[0].requires_accommodation);
        assert!(!days[1].requires_accommodation);
        assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert_eq!(flatten(&days), vec!["p0", "p1", "p2", "p3"]);
    }

    #[test]
    fn test_travel_ceiling_splits() {
        let config = OptimizerConfig {
            max_day_travel_minutes: 100,
            day_end_minutes: 24 * 60,
            ..OptimizerConfig::default()
        };
        let input = stops(&[(60, 10), (60, 10)]);
        let days = DaySegmenter::new(&config).segment(&input, 0, None);
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn test_days_stay_under_ceiling() {
        let config = OptimizerConfig::default();
        let input = stops(&[(45, 120); 12]);
        let days = DaySegmenter::new(&config).segment(&input, 540, None);
        for day in &days {
            assert!(day.total_minutes() <= config.max_day_minutes);
        }
        assert_eq!(flatten(&days).len(), 12);
    }

    #[test]
    fn test_oversize_stop_gets_its_own_day() {
        let config = OptimizerConfig::default();
        let input = stops(&[(10, 60), (10, 900), (10, 60)]);
        let days = DaySegmenter::new(&config).segment(&input, 540, None);

        assert_eq!(days.len(), 3);
        assert_eq!(days[1].places, vec!["p1"]);
        assert!(days[1].total_minutes() > config.max_day_minutes);
    }

    #[test]
    fn test_scheduled_day_is_honored() {
        let config = OptimizerConfig::default();
        let input = vec![DayStop::new("a", 5, 30), DayStop::new("b", 5, 30).on_day(1)];
        let start = NaiveDate::from_ymd_opt(2024, 6, 1);
        let days = DaySegmenter::new(&config).segment(&input, 540, start);
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2024, 6, 2));
    }

    #[test]
    fn test_first_stop_on_later_day_redates_day_one() {
        let config = OptimizerConfig::default();
        let input = vec![DayStop::new("a", 0, 30).on_day(1), DayStop::new("b", 10, 30).on_day(1)];
        let start = NaiveDate::from_ymd_opt(2024, 6, 1);
        let days = DaySegmenter::new(&config).segment(&input, 19 * 60, start);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].day, 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert_eq!(days[0].places, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input() {
        let config = OptimizerConfig::default();
        assert!(DaySegmenter::new(&config).segment(&[], 540, None).is_empty());
    }
}
