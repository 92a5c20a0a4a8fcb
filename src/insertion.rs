//! Cheapest insertion of a single new stop into an existing order.

use crate::matrix::DistanceMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion {
    /// Index in the existing order the new node is placed at.
    pub position: usize,
    pub marginal_cost: f64,
}

/// Marginal distance of placing `candidate` between `prev` and `next`.
fn marginal_cost(
    matrix: &DistanceMatrix,
    prev: Option<usize>,
    candidate: usize,
    next: Option<usize>,
) -> f64 {
    match (prev, next) {
        (Some(p), Some(n)) => {
            matrix.distance(p, candidate) + matrix.distance(candidate, n) - matrix.distance(p, n)
        }
        (Some(p), None) => matrix.distance(p, candidate),
        (None, Some(n)) => matrix.distance(candidate, n),
        (None, None) => 0.0,
    }
}

/// Evaluate every position `0..=order.len()` for `candidate`.
///
/// `anchor` is a fixed predecessor of position 0 (the explicit start
/// location). Equal costs resolve to the lowest position.
pub fn cheapest_insertion(
    order: &[usize],
    candidate: usize,
    anchor: Option<usize>,
    matrix: &DistanceMatrix,
) -> Insertion {
    let mut best = Insertion {
        position: 0,
        marginal_cost: f64::INFINITY,
    };

    for position in 0..=order.len() {
        let prev = if position == 0 { anchor } else { Some(order[position - 1]) };
        let next = order.get(position).copied();
        let cost = marginal_cost(matrix, prev, candidate, next);
        if cost < best.marginal_cost {
            best = Insertion {
                position,
                marginal_cost: cost,
            };
        }
    }

    best
}

/// Insert `candidate` at its cheapest position, leaving the relative order
/// of existing stops untouched.
pub fn insert_cheapest(
    order: &mut Vec<usize>,
    candidate: usize,
    anchor: Option<usize>,
    matrix: &DistanceMatrix,
) -> Insertion {
    let insertion = cheapest_insertion(order, candidate, anchor, matrix);
    order.insert(insertion.position, candidate);
    insertion
}
