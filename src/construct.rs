//! Nearest-neighbor tour construction.

use crate::matrix::DistanceMatrix;

/// Build an open path from `start`, always extending to the closest
/// unvisited node.
///
/// `tie_keys[i]` breaks exact distance ties: the lowest key wins. Every
/// node of the matrix appears exactly once in the result.
pub fn nearest_neighbor<K: AsRef<str>>(
    matrix: &DistanceMatrix,
    start: usize,
    tie_keys: &[K],
) -> Vec<usize> {
    let n = matrix.len();
    if n == 0 {
        return Vec::new();
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut current = start.min(n - 1);
    visited[current] = true;
    order.push(current);

    while order.len() < n {
        let mut best: Option<usize> = None;
        for candidate in (0..n).filter(|&c| !visited[c]) {
            best = match best {
                None => Some(candidate),
                Some(incumbent) => {
                    let d_candidate = matrix.distance(current, candidate);
                    let d_incumbent = matrix.distance(current, incumbent);
                    let closer = d_candidate < d_incumbent;
                    let tied_lower = d_candidate == d_incumbent
                        && key(tie_keys, candidate) < key(tie_keys, incumbent);
                    if closer || tied_lower {
                        Some(candidate)
                    } else {
                        Some(incumbent)
                    }
                }
            };
        }

        let Some(next) = best else { break };
        visited[next] = true;
        order.push(next);
        current = next;
    }

    order
}

fn key<K: AsRef<str>>(keys: &[K], index: usize) -> &str {
    keys.get(index).map(|k| k.as_ref()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineProvider;
    use crate::matrix::Leg;
    use crate::model::{Coordinates, TravelMode};

    fn line_matrix(points: &[f64]) -> DistanceMatrix {
        let mut matrix = DistanceMatrix::zeros(points.len());
        for (i, a) in points.iter().enumerate() {
            for (j, b) in points.iter().enumerate() {
                matrix.set(i, j, Leg::new((a - b).abs(), 0.0));
            }
        }
        matrix
    }

    #[test]
    fn test_colinear_points_visited_in_order() {
        let locations = vec![
            Coordinates::new(0.0, 0.0),
            Coordinates::new(0.0, 2.0),
            Coordinates::new(0.0, 1.0),
        ];
        let matrix = HaversineProvider.compute(&locations, TravelMode::Car);
        let order = nearest_neighbor(&matrix, 0, &["A", "C", "B"]);
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_tie_goes_to_lowest_key() {
        // Nodes 1 and 2 are both 5 away from node 0.
        let matrix = line_matrix(&[0.0, 5.0, -5.0]);
        let order = nearest_neighbor(&matrix, 0, &["start", "zulu", "alpha"]);
        assert_eq!(order, vec![0, 2, 1]);

        let order = nearest_neighbor(&matrix, 0, &["start", "alpha", "zulu"]);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_result_is_permutation() {
        let matrix = line_matrix(&[3.0, 9.0, 1.0, 7.0, 4.0, 4.5]);
        let keys = ["a", "b", "c", "d", "e", "f"];
        let mut order = nearest_neighbor(&matrix, 3, &keys);
        assert_eq!(order[0], 3);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_matrix() {
        let keys: [&str; 0] = [];
        assert!(nearest_neighbor(&DistanceMatrix::zeros(0), 0, &keys).is_empty());
    }
}
