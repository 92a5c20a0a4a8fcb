//! 2-opt local search over an open path with both endpoints pinned.

use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::matrix::DistanceMatrix;

/// Gains below this are treated as zero so float noise cannot cycle.
const MIN_GAIN: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TwoOptLimits {
    pub max_passes: usize,
    pub deadline: Option<Instant>,
    /// Instances at least this large evaluate each pass in parallel.
    pub parallel_threshold: usize,
}

impl Default for TwoOptLimits {
    fn default() -> Self {
        Self {
            max_passes: 1_000,
            deadline: None,
            parallel_threshold: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwoOptOutcome {
    pub order: Vec<usize>,
    pub passes: usize,
    pub improvements: usize,
    /// Set when the pass cap or deadline stopped the search before a local
    /// optimum was confirmed.
    pub terminated_early: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Move {
    gain: f64,
    i: usize,
    j: usize,
}

/// Distance saved by reversing `order[i..=j]`.
///
/// On a directed matrix the interior edges change direction too, so their
/// difference is added; a symmetric matrix only changes the two boundaries.
fn reversal_gain(order: &[usize], matrix: &DistanceMatrix, symmetric: bool, i: usize, j: usize) -> f64 {
    let before = matrix.distance(order[i - 1], order[i]) + matrix.distance(order[j], order[j + 1]);
    let after = matrix.distance(order[i - 1], order[j]) + matrix.distance(order[i], order[j + 1]);
    if symmetric {
        return before - after;
    }
    let interior: f64 = order[i..=j]
        .windows(2)
        .map(|pair| matrix.distance(pair[0], pair[1]) - matrix.distance(pair[1], pair[0]))
        .sum();
    before - after + interior
}

/// Improve `order` with 2-opt until no reversal of `[i..=j]`,
/// `1 <= i < j < n - 1`, shortens the path.
///
/// The first and last stops never move. Total distance never increases.
pub fn two_opt(order: Vec<usize>, matrix: &DistanceMatrix, limits: &TwoOptLimits) -> TwoOptOutcome {
    if order.len() >= limits.parallel_threshold.max(4) {
        best_improvement(order, matrix, limits)
    } else {
        first_improvement(order, matrix, limits)
    }
}

fn deadline_passed(limits: &TwoOptLimits) -> bool {
    limits.deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Sequential scan applying every improving reversal as it is found.
fn first_improvement(mut order: Vec<usize>, matrix: &DistanceMatrix, limits: &TwoOptLimits) -> TwoOptOutcome {
    let n = order.len();
    let mut passes = 0;
    let mut improvements = 0;
    let symmetric = matrix.is_symmetric();

    if n < 4 {
        return TwoOptOutcome { order, passes, improvements, terminated_early: false };
    }

    let mut improved = true;
    while improved {
        if passes >= limits.max_passes || deadline_passed(limits) {
            debug!(passes, improvements, "2-opt stopped before convergence");
            return TwoOptOutcome { order, passes, improvements, terminated_early: true };
        }
        improved = false;
        passes += 1;

        for i in 1..n - 2 {
            for j in (i + 1)..n - 1 {
                if reversal_gain(&order, matrix, symmetric, i, j) > MIN_GAIN {
                    order[i..=j].reverse();
                    improvements += 1;
                    improved = true;
                }
            }
        }
    }

    debug!(passes, improvements, "2-opt reached local optimum");
    TwoOptOutcome { order, passes, improvements, terminated_early: false }
}

/// Each pass evaluates all rows in parallel and applies the single best
/// move. Ties go to the lowest `(i, j)`, so the result does not depend on
/// thread count.
fn best_improvement(mut order: Vec<usize>, matrix: &DistanceMatrix, limits: &TwoOptLimits) -> TwoOptOutcome {
    let n = order.len();
    let mut passes = 0;
    let mut improvements = 0;
    let symmetric = matrix.is_symmetric();

    loop {
        if passes >= limits.max_passes || deadline_passed(limits) {
            debug!(passes, improvements, "parallel 2-opt stopped before convergence");
            return TwoOptOutcome { order, passes, improvements, terminated_early: true };
        }
        passes += 1;

        let current = &order;
        let best = (1..n - 2)
            .into_par_iter()
            .filter_map(|i| {
                ((i + 1)..n - 1)
                    .map(|j| Move { gain: reversal_gain(current, matrix, symmetric, i, j), i, j })
                    .filter(|m| m.gain > MIN_GAIN)
                    .reduce(better_move)
            })
            .reduce_with(better_move);

        match best {
            Some(m) => {
                order[m.i..=m.j].reverse();
                improvements += 1;
            }
            None => break,
        }
    }

    debug!(passes, improvements, "parallel 2-opt reached local optimum");
    TwoOptOutcome { order, passes, improvements, terminated_early: false }
}

fn better_move(a: Move, b: Move) -> Move {
    if b.gain > a.gain || (b.gain == a.gain && (b.i, b.j) < (a.i, a.j)) {
        b
    } else {
        a
    }
}
