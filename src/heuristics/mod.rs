//! Heuristics module.
//!
//! Construction and improvement heuristics used to seed the exact search
//! with an incumbent and to estimate instances in `analyze`.

pub mod construction;
pub mod local_search;

pub use construction::*;
pub use local_search::*;

use crate::instance::DistanceMatrix;
use crate::solution::Solution;

/// Nearest neighbour from every start city, then VND (2-opt + Or-opt)
pub fn warm_start(matrix: &DistanceMatrix) -> Option<Solution> {
    if matrix.dimension() < 2 {
        return None;
    }
    let start = std::time::Instant::now();
    let mut solution = NearestNeighborHeuristic::all_starts().construct(matrix);
    let constructed = solution.cost;
    VND::default().improve(matrix, &mut solution);
    if let Some(zero) = solution.tour.iter().position(|&c| c == 0) {
        solution.tour.rotate_left(zero);
    }
    solution.validate(matrix);
    solution.algorithm = "NearestNeighbor+VND".to_string();
    solution.computation_time = start.elapsed().as_secs_f64();
    log::debug!(
        "warm start: {:.4} after construction, {:.4} after local search",
        constructed,
        solution.cost
    );
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_start() {
        assert!(warm_start(&DistanceMatrix::random_euclidean(1, 0)).is_none());
        let matrix = DistanceMatrix::random_euclidean(10, 4);
        let sol = warm_start(&matrix).unwrap();
        assert!(sol.is_complete(&matrix));
        assert_eq!(sol.tour[0], 0);
    }
}
