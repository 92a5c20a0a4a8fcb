//! Per-leg transport mode selection, fares and budget repair.

use tracing::{debug, warn};

use crate::matrix::ModeMatrices;
use crate::model::{Constraints, Segment, TravelMode, Warning, WarningKind};

/// Leg length classes with the modes suited to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBucket {
    /// Under 2 km.
    Short,
    /// 2 to 15 km.
    Urban,
    /// 15 to 100 km.
    Regional,
    /// 100 to 500 km.
    Intercity,
    /// Over 500 km.
    LongHaul,
}

impl DistanceBucket {
    pub fn for_distance(distance_meters: f64) -> Self {
        let km = distance_meters / 1000.0;
        if km < 2.0 {
            DistanceBucket::Short
        } else if km < 15.0 {
            DistanceBucket::Urban
        } else if km < 100.0 {
            DistanceBucket::Regional
        } else if km <= 500.0 {
            DistanceBucket::Intercity
        } else {
            DistanceBucket::LongHaul
        }
    }

    pub fn recommended(&self) -> &'static [TravelMode] {
        match self {
            DistanceBucket::Short => &[TravelMode::Walking],
            DistanceBucket::Urban => &[TravelMode::Cycling, TravelMode::Scooter, TravelMode::Transit],
            DistanceBucket::Regional => &[TravelMode::Bus, TravelMode::Train, TravelMode::Car],
            DistanceBucket::Intercity => &[TravelMode::Train, TravelMode::Bus, TravelMode::Car],
            DistanceBucket::LongHaul => &[TravelMode::Flight, TravelMode::HighSpeedTrain],
        }
    }
}

fn in_range(mode: TravelMode, distance_meters: f64) -> bool {
    distance_meters / 1000.0 <= mode.max_range_km()
}

#[derive(Debug, Clone, Default)]
pub struct ModeSelection {
    pub segments: Vec<Segment>,
    pub total_cost: f64,
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<String>,
}

pub struct TransportModeSelector<'a> {
    constraints: &'a Constraints,
    multi_modal: bool,
}

impl<'a> TransportModeSelector<'a> {
    pub fn new(constraints: &'a Constraints, multi_modal: bool) -> Self {
        Self {
            constraints,
            multi_modal,
        }
    }

    /// Requested modes fit for a leg, widening the pool when nothing
    /// requested is recommended for the distance.
    ///
    /// The flag is set when no requested mode is even in range.
    pub fn candidates(&self, distance_meters: f64) -> (Vec<TravelMode>, bool) {
        let requested = &self.constraints.travel_types;
        let recommended = DistanceBucket::for_distance(distance_meters).recommended();

        let preferred: Vec<TravelMode> = requested
            .iter()
            .copied()
            .filter(|mode| recommended.contains(mode))
            .collect();
        if !preferred.is_empty() {
            return (preferred, false);
        }

        let reachable: Vec<TravelMode> = requested
            .iter()
            .copied()
            .filter(|mode| in_range(*mode, distance_meters))
            .collect();
        if !reachable.is_empty() {
            return (reachable, false);
        }

        (requested.clone(), true)
    }

    /// Assign a mode to every consecutive pair of `path`. `ids` is indexed
    /// by matrix node.
    pub fn select(&self, path: &[usize], ids: &[String], matrices: &ModeMatrices) -> ModeSelection {
        let mut selection = ModeSelection::default();

        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let distance = matrices.primary().distance(from, to);
            let mode = self.choose(from, to, distance, matrices, &ids[from], &ids[to], &mut selection);
            selection.segments.push(segment(matrices, mode, from, to, ids));
        }

        selection.total_cost = selection.segments.iter().map(|s| s.cost).sum();

        if let Some(budget) = self.constraints.budget {
            if selection.total_cost > budget {
                if self.constraints.strict_budget {
                    self.enforce_budget(budget, path, ids, matrices, &mut selection);
                } else {
                    selection.suggestions.push(format!(
                        "Estimated transport cost {:.2} exceeds budget {:.2}; enable strict budget or add cheaper travel types",
                        selection.total_cost, budget
                    ));
                }
            }
        }

        debug!(
            legs = selection.segments.len(),
            total_cost = selection.total_cost,
            multi_modal = self.multi_modal,
            "transport modes selected"
        );
        selection
    }

    #[allow(clippy::too_many_arguments)]
    fn choose(
        &self,
        from: usize,
        to: usize,
        distance: f64,
        matrices: &ModeMatrices,
        from_id: &str,
        to_id: &str,
        selection: &mut ModeSelection,
    ) -> TravelMode {
        if !self.multi_modal {
            let mode = self.constraints.primary_mode();
            if !in_range(mode, distance) {
                selection.suggestions.push(format!(
                    "Leg {from_id} -> {to_id} ({:.1} km) is long for {mode}; consider multi-modal routing",
                    distance / 1000.0
                ));
            }
            return mode;
        }

        let (candidates, widened) = self.candidates(distance);
        if widened {
            selection.suggestions.push(format!(
                "No requested travel type suits leg {from_id} -> {to_id} ({:.1} km)",
                distance / 1000.0
            ));
        }

        let by_cost = self.constraints.budget.is_some();
        candidates
            .into_iter()
            .map(|mode| {
                let leg = matrices.leg(mode, from, to);
                (mode, leg.duration_seconds, mode.leg_cost(leg.distance_meters))
            })
            .min_by(|a, b| {
                let (primary, secondary) = if by_cost { ((a.2, b.2), (a.1, b.1)) } else { ((a.1, b.1), (a.2, b.2)) };
                primary
                    .0
                    .total_cmp(&primary.1)
                    .then(secondary.0.total_cmp(&secondary.1))
                    .then(a.0.cmp(&b.0))
            })
            .map(|(mode, _, _)| mode)
            .unwrap_or_else(|| self.constraints.primary_mode())
    }

    /// Downgrade the most expensive leg to the next cheaper in-range
    /// requested mode until the total fits `budget`.
    fn enforce_budget(
        &self,
        budget: f64,
        path: &[usize],
        ids: &[String],
        matrices: &ModeMatrices,
        selection: &mut ModeSelection,
    ) {
        let mut downgrades = 0;

        while selection.total_cost > budget {
            let mut legs: Vec<usize> = (0..selection.segments.len()).collect();
            legs.sort_by(|a, b| {
                selection.segments[*b]
                    .cost
                    .total_cmp(&selection.segments[*a].cost)
                    .then(a.cmp(b))
            });

            let downgrade = legs.into_iter().find_map(|leg| {
                let (from, to) = (path[leg], path[leg + 1]);
                let current = &selection.segments[leg];
                self.constraints
                    .travel_types
                    .iter()
                    .copied()
                    .filter(|mode| *mode != current.mode)
                    .filter(|mode| in_range(*mode, current.distance_meters))
                    .map(|mode| segment(matrices, mode, from, to, ids))
                    .filter(|candidate| candidate.cost < current.cost)
                    .max_by(|a, b| a.cost.total_cmp(&b.cost).then(b.mode.cmp(&a.mode)))
                    .map(|candidate| (leg, candidate))
            });

            let Some((leg, replacement)) = downgrade else {
                warn!(total_cost = selection.total_cost, budget, "budget cannot be met");
                selection.warnings.push(Warning::new(
                    WarningKind::ConstraintConflict,
                    format!(
                        "Transport cost {:.2} exceeds strict budget {:.2} with the cheapest available modes",
                        selection.total_cost, budget
                    ),
                ));
                return;
            };

            debug!(
                from = %replacement.from_id,
                to = %replacement.to_id,
                mode = %replacement.mode,
                "leg downgraded for budget"
            );
            selection.segments[leg] = replacement;
            selection.total_cost = selection.segments.iter().map(|s| s.cost).sum();
            downgrades += 1;
        }

        if downgrades > 0 {
            selection.suggestions.push(format!(
                "{downgrades} leg(s) switched to cheaper travel types to stay within budget {budget:.2}"
            ));
        }
    }
}

fn segment(matrices: &ModeMatrices, mode: TravelMode, from: usize, to: usize, ids: &[String]) -> Segment {
    let leg = matrices.leg(mode, from, to);
    Segment {
        from_id: ids[from].clone(),
        to_id: ids[to].clone(),
        distance_meters: leg.distance_meters,
        travel_time_seconds: leg.duration_seconds,
        mode,
        cost: mode.leg_cost(leg.distance_meters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineProvider;
    use crate::model::Coordinates;

    /// Points along the equator at the given kilometre offsets.
    fn matrices(offsets_km: &[f64], modes: &[TravelMode]) -> (ModeMatrices, Vec<String>) {
        let locations: Vec<Coordinates> = offsets_km
            .iter()
            .map(|km| Coordinates::new(0.0, km / 111.195))
            .collect();
        let matrices = modes.iter().fold(
            ModeMatrices::new(modes[0], HaversineProvider.compute(&locations, modes[0])),
            |matrices, mode| matrices.with_mode(*mode, HaversineProvider.compute(&locations, *mode)),
        );
        let ids = (0..offsets_km.len()).map(|i| format!("p{i}")).collect();
        (matrices, ids)
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(DistanceBucket::for_distance(1_999.0), DistanceBucket::Short);
        assert_eq!(DistanceBucket::for_distance(2_000.0), DistanceBucket::Urban);
        assert_eq!(DistanceBucket::for_distance(50_000.0), DistanceBucket::Regional);
        assert_eq!(DistanceBucket::for_distance(500_000.0), DistanceBucket::Intercity);
        assert_eq!(DistanceBucket::for_distance(600_000.0), DistanceBucket::LongHaul);
    }

    #[test]
    fn test_long_leg_picks_flight_or_high_speed_rail() {
        let modes = [TravelMode::Walking, TravelMode::Car, TravelMode::Train, TravelMode::Flight];
        let (matrices, ids) = matrices(&[0.0, 600.0], &modes);
        let constraints = Constraints::new(modes.to_vec());
        let selection = TransportModeSelector::new(&constraints, true).select(&[0, 1], &ids, &matrices);

        let mode = selection.segments[0].mode;
        assert!(matches!(mode, TravelMode::Flight | TravelMode::HighSpeedTrain));
        assert_ne!(mode, TravelMode::Walking);
    }

    #[test]
    fn test_short_leg_prefers_walking() {
        let modes = [TravelMode::Car, TravelMode::Walking];
        let (matrices, ids) = matrices(&[0.0, 1.0], &modes);
        let constraints = Constraints::new(modes.to_vec());
        let selection = TransportModeSelector::new(&constraints, true).select(&[0, 1], &ids, &matrices);
        assert_eq!(selection.segments[0].mode, TravelMode::Walking);
        assert_eq!(selection.total_cost, 0.0);
    }

    #[test]
    fn test_uniform_mode_without_multi_modal() {
        let modes = [TravelMode::Car, TravelMode::Walking];
        let (matrices, ids) = matrices(&[0.0, 1.0, 300.0], &modes);
        let constraints = Constraints::new(modes.to_vec());
        let selection = TransportModeSelector::new(&constraints, false).select(&[0, 1, 2], &ids, &matrices);
        assert!(selection.segments.iter().all(|s| s.mode == TravelMode::Car));
    }

    #[test]
    fn test_out_of_range_falls_back_with_suggestion() {
        let modes = [TravelMode::Walking];
        let (matrices, ids) = matrices(&[0.0, 40.0], &modes);
        let constraints = Constraints::new(modes.to_vec());
        let selection = TransportModeSelector::new(&constraints, true).select(&[0, 1], &ids, &matrices);
        assert_eq!(selection.segments[0].mode, TravelMode::Walking);
        assert_eq!(selection.suggestions.len(), 1);
    }

    #[test]
    fn test_strict_budget_downgrades_legs() {
        let modes = [TravelMode::Flight, TravelMode::Train];
        let (matrices, ids) = matrices(&[0.0, 600.0, 1200.0], &modes);
        let mut constraints = Constraints::new(modes.to_vec());
        // Flights: 2 * (60 + 72) = 264. Trains: 2 * (5 + 90) = 190.
        constraints.budget = Some(200.0);
        constraints.strict_budget = true;
        // Budget set, so legs start at the cheapest recommended mode: flight.
        let selection = TransportModeSelector::new(&constraints, true).select(&[0, 1, 2], &ids, &matrices);

        assert!(selection.total_cost <= 200.0);
        assert!(selection.warnings.is_empty());
        assert!(selection.segments.iter().all(|s| s.mode == TravelMode::Train));
    }

    #[test]
    fn test_impossible_strict_budget_warns() {
        let modes = [TravelMode::Flight];
        let (matrices, ids) = matrices(&[0.0, 600.0], &modes);
        let mut constraints = Constraints::new(modes.to_vec());
        constraints.budget = Some(10.0);
        constraints.strict_budget = true;
        let selection = TransportModeSelector::new(&constraints, true).select(&[0, 1], &ids, &matrices);

        assert_eq!(selection.warnings.len(), 1);
        assert_eq!(selection.warnings[0].kind, WarningKind::ConstraintConflict);
    }

    #[test]
    fn test_soft_budget_overage_is_a_suggestion() {
        let modes = [TravelMode::Car];
        let (matrices, ids) = matrices(&[0.0, 100.0], &modes);
        let mut constraints = Constraints::new(modes.to_vec());
        constraints.budget = Some(1.0);
        let selection = TransportModeSelector::new(&constraints, false).select(&[0, 1], &ids, &matrices);

        assert!(selection.warnings.is_empty());
        assert!(selection.suggestions.iter().any(|s| s.contains("exceeds budget")));
    }
}
