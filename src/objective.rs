//! Priority-weighted route objective.
//!
//! `cost = (1 - w) * distance / reference - w * normalized_priority`, where
//! normalized priority rewards visiting high-priority places early.

use crate::matrix::DistanceMatrix;

#[derive(Debug, Clone)]
pub struct Objective<'a> {
    matrix: &'a DistanceMatrix,
    /// Priority per matrix node; 0 for nodes that are not places.
    priorities: &'a [u8],
    weight: f64,
    reference_distance: f64,
}

impl<'a> Objective<'a> {
    /// `reference_distance` normalizes distance so both terms share a scale;
    /// non-positive references are treated as 1 m.
    pub fn new(matrix: &'a DistanceMatrix, priorities: &'a [u8], weight: f64, reference_distance: f64) -> Self {
        let reference_distance = if reference_distance > 0.0 { reference_distance } else { 1.0 };
        Self {
            matrix,
            priorities,
            weight: weight.clamp(0.0, 1.0),
            reference_distance,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn matrix(&self) -> &DistanceMatrix {
        self.matrix
    }

    pub fn normalized_distance(&self, order: &[usize]) -> f64 {
        self.matrix.path_distance(order) / self.reference_distance
    }

    /// In `[0, 1]`: 1 when every stop has priority 10, with earlier
    /// positions weighted more.
    pub fn normalized_priority(&self, order: &[usize]) -> f64 {
        let n = order.len();
        if n == 0 {
            return 0.0;
        }
        let mut score = 0.0;
        let mut max_score = 0.0;
        for (position, node) in order.iter().enumerate() {
            let rank_weight = (n - position) as f64;
            let priority = self.priorities.get(*node).copied().unwrap_or(0);
            score += f64::from(priority) * rank_weight;
            max_score += 10.0 * rank_weight;
        }
        score / max_score
    }

    pub fn cost(&self, order: &[usize]) -> f64 {
        let distance_term = (1.0 - self.weight) * self.normalized_distance(order);
        if self.weight == 0.0 {
            return distance_term;
        }
        distance_term - self.weight * self.normalized_priority(order)
    }
}
