//! Simulated annealing over segment reversals.

use std::time::Instant;

use rand::Rng;
use tracing::debug;

use crate::config::AnnealingConfig;
use crate::objective::Objective;

#[derive(Debug, Clone)]
pub struct AnnealingOutcome {
    /// Best order seen, not the final walker position.
    pub order: Vec<usize>,
    pub cost: f64,
    pub iterations: usize,
    pub accepted: usize,
    /// Set only when the deadline cut the schedule short.
    pub terminated_early: bool,
}

/// Anneal from `initial`, keeping `initial[0]` pinned.
///
/// Each step reverses a random segment `[i..=j]` with `1 <= i < j < n`.
/// Worse moves are accepted with probability `exp(-delta / T)`; `T` cools
/// geometrically until `min_temperature` or the iteration budget.
pub fn anneal<R: Rng>(
    initial: Vec<usize>,
    objective: &Objective<'_>,
    config: &AnnealingConfig,
    deadline: Option<Instant>,
    rng: &mut R,
) -> AnnealingOutcome {
    let n = initial.len();
    let mut current = initial;
    let mut current_cost = objective.cost(&current);
    let mut best = current.clone();
    let mut best_cost = current_cost;

    if n < 3 {
        return AnnealingOutcome {
            order: best,
            cost: best_cost,
            iterations: 0,
            accepted: 0,
            terminated_early: false,
        };
    }

    let mut temperature = config.initial_temperature;
    let mut iterations = 0;
    let mut accepted = 0;
    let mut terminated_early = false;

    while iterations < config.max_iterations && temperature >= config.min_temperature {
        // Deadline polled every 256 iterations.
        if iterations % 256 == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
            terminated_early = true;
            break;
        }
        iterations += 1;

        let i = rng.gen_range(1..n - 1);
        let j = rng.gen_range(i + 1..n);
        current[i..=j].reverse();
        let candidate_cost = objective.cost(&current);
        let delta = candidate_cost - current_cost;

        let accept = delta <= 0.0 || rng.gen_range(0.0..1.0) < (-delta / temperature).exp();
        if accept {
            accepted += 1;
            current_cost = candidate_cost;
            if current_cost < best_cost {
                best_cost = current_cost;
                best.clone_from(&current);
            }
        } else {
            current[i..=j].reverse();
        }

        temperature *= config.cooling_rate;
    }

    debug!(iterations, accepted, best_cost, terminated_early, "annealing finished");

    AnnealingOutcome {
        order: best,
        cost: best_cost,
        iterations,
        accepted,
        terminated_early,
    }
}
