use crate::instance::DistanceMatrix;
use crate::solution::Solution;
use ordered_float::OrderedFloat;

pub trait ConstructionHeuristic {
    fn construct(&self, matrix: &DistanceMatrix) -> Solution;
    fn name(&self) -> &str;
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly moving to the closest unvisited city along
/// outgoing edges. With `all_starts` every city is tried as the start and
/// the cheapest tour is kept.
pub struct NearestNeighborHeuristic {
    pub all_starts: bool,
}

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic { all_starts: false }
    }

    pub fn all_starts() -> Self {
        NearestNeighborHeuristic { all_starts: true }
    }

    fn find_nearest(&self, matrix: &DistanceMatrix, current: usize, visited: &[bool]) -> Option<usize> {
        (0..matrix.dimension())
            .filter(|&c| !visited[c])
            .min_by_key(|&c| (OrderedFloat(matrix.distance(current, c)), c))
    }

    fn tour_from(&self, matrix: &DistanceMatrix, start: usize) -> Vec<usize> {
        let n = matrix.dimension();
        let mut visited = vec![false; n];
        let mut tour = Vec::with_capacity(n);
        let mut current = start;
        visited[start] = true;
        tour.push(start);

        while let Some(next) = self.find_nearest(matrix, current, &visited) {
            visited[next] = true;
            tour.push(next);
            current = next;
        }
        tour
    }
}

impl Default for NearestNeighborHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, matrix: &DistanceMatrix) -> Solution {
        let start = std::time::Instant::now();
        let n = matrix.dimension();
        if n == 0 {
            return Solution::new();
        }

        let starts = if self.all_starts { 0..n } else { 0..1 };
        let mut best: Option<Solution> = None;
        for first in starts {
            let mut tour = self.tour_from(matrix, first);
            let zero = tour.iter().position(|&c| c == 0).unwrap_or(0);
            tour.rotate_left(zero);
            let candidate = Solution::from_tour(matrix, tour, self.name());
            if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                best = Some(candidate);
            }
        }

        let mut solution = best.unwrap_or_default();
        solution.iterations = Some(if self.all_starts { n } else { 1 });
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        if self.all_starts {
            "NearestNeighbor-AllStarts"
        } else {
            "NearestNeighbor"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_neighbor_follows_cheapest_edges() {
        let matrix = DistanceMatrix::new(vec![
            vec![0.0, 1.0, 5.0, 5.0],
            vec![5.0, 0.0, 1.0, 5.0],
            vec![5.0, 5.0, 0.0, 1.0],
            vec![1.0, 5.0, 5.0, 0.0],
        ])
        .unwrap();
        let sol = NearestNeighborHeuristic::new().construct(&matrix);
        assert_eq!(sol.tour, vec![0, 1, 2, 3]);
        assert!((sol.cost - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_starts_is_complete_and_not_worse() {
        let matrix = DistanceMatrix::random_euclidean(12, 3);
        let single = NearestNeighborHeuristic::new().construct(&matrix);
        let multi = NearestNeighborHeuristic::all_starts().construct(&matrix);
        assert!(multi.is_complete(&matrix));
        assert_eq!(multi.tour[0], 0);
        assert!(multi.cost <= single.cost + 1e-9);
        assert_eq!(multi.iterations, Some(12));
    }
}
