//! Local search improvement heuristics.
//!
//! - 2-opt with direction-aware deltas
//! - Or-opt (segment relocation)
//! - Variable Neighborhood Descent over both

use crate::instance::DistanceMatrix;
use crate::solution::Solution;

const IMPROVEMENT_EPS: f64 = 1e-9;

/// Trait for local search improvement methods
pub trait LocalSearch {
    fn improve(&self, matrix: &DistanceMatrix, solution: &mut Solution) -> bool;
    fn name(&self) -> &str;
}

/// 2-Opt Local Search
///
/// Reverses segments of the tour to reduce total cost. Reversal changes the
/// direction of the inner edges, which the delta accounts for.
pub struct TwoOptSearch {
    /// Use first improvement instead of best improvement
    pub first_improvement: bool,
    /// Upper bound on improving passes
    pub max_passes: usize,
}

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch {
            first_improvement: false,
            max_passes: 1000,
        }
    }

    pub fn first_improvement() -> Self {
        TwoOptSearch {
            first_improvement: true,
            max_passes: 1000,
        }
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, matrix: &DistanceMatrix, solution: &mut Solution) -> bool {
        let n = solution.tour.len();
        if n < 4 {
            return false;
        }

        let mut total_improved = false;
        for _ in 0..self.max_passes {
            let mut best: Option<(usize, usize, f64)> = None;

            'scan: for i in 0..n - 2 {
                for j in i + 2..n {
                    if i == 0 && j == n - 1 {
                        continue;
                    }
                    let delta = solution.two_opt_delta(matrix, i, j);
                    if delta < -IMPROVEMENT_EPS && best.map_or(true, |(_, _, d)| delta < d) {
                        best = Some((i, j, delta));
                        if self.first_improvement {
                            break 'scan;
                        }
                    }
                }
            }

            match best {
                Some((i, j, delta)) => {
                    solution.apply_two_opt(i, j);
                    solution.cost += delta;
                    total_improved = true;
                }
                None => break,
            }
        }

        solution.validate(matrix);
        total_improved
    }

    fn name(&self) -> &str {
        if self.first_improvement {
            "2-Opt-FI"
        } else {
            "2-Opt-BI"
        }
    }
}

/// Or-Opt Local Search
///
/// Relocates segments of 1, 2, or 3 consecutive cities to other positions.
pub struct OrOptSearch {
    pub max_segment: usize,
    pub max_passes: usize,
}

impl OrOptSearch {
    pub fn new() -> Self {
        OrOptSearch {
            max_segment: 3,
            max_passes: 1000,
        }
    }
}

impl Default for OrOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for OrOptSearch {
    fn improve(&self, matrix: &DistanceMatrix, solution: &mut Solution) -> bool {
        let n = solution.tour.len();
        if n < 4 {
            return false;
        }

        let mut total_improved = false;
        for _ in 0..self.max_passes {
            let mut found = None;
            'scan: for len in 1..=self.max_segment.min(n - 2) {
                for start in 0..=n - len {
                    for to in 0..n {
                        if (start..start + len).contains(&to) || to + 1 == start {
                            continue;
                        }
                        let delta = solution.relocation_delta(matrix, start, len, to);
                        if delta < -IMPROVEMENT_EPS {
                            found = Some((start, len, to));
                            break 'scan;
                        }
                    }
                }
            }

            match found {
                Some((start, len, to)) => {
                    solution.apply_relocation(start, len, to);
                    solution.validate(matrix);
                    total_improved = true;
                }
                None => break,
            }
        }
        total_improved
    }

    fn name(&self) -> &str {
        "Or-Opt"
    }
}

/// Variable Neighborhood Descent (VND)
///
/// Applies multiple local search operators in a systematic way.
pub struct VND {
    operators: Vec<Box<dyn LocalSearch + Send + Sync>>,
}

impl VND {
    pub fn with_standard_operators() -> Self {
        let operators: Vec<Box<dyn LocalSearch + Send + Sync>> = vec![
            Box::new(TwoOptSearch::first_improvement()),
            Box::new(OrOptSearch::new()),
        ];
        VND { operators }
    }
}

impl Default for VND {
    fn default() -> Self {
        Self::with_standard_operators()
    }
}

impl LocalSearch for VND {
    fn improve(&self, matrix: &DistanceMatrix, solution: &mut Solution) -> bool {
        let mut total_improved = false;
        let mut k = 0;
        let mut total_iterations = 0;
        let max_total_iterations = 100;

        while k < self.operators.len() && total_iterations < max_total_iterations {
            if self.operators[k].improve(matrix, solution) {
                total_improved = true;
                k = 0;
            } else {
                k += 1;
            }
            total_iterations += 1;
        }

        total_improved
    }

    fn name(&self) -> &str {
        "VND"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> DistanceMatrix {
        // unit square 0-1-2-3; the crossing order 0-2-1-3 costs more
        let s = std::f64::consts::SQRT_2;
        DistanceMatrix::new(vec![
            vec![0.0, 1.0, s, 1.0],
            vec![1.0, 0.0, 1.0, s],
            vec![s, 1.0, 0.0, 1.0],
            vec![1.0, s, 1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_two_opt_removes_crossing() {
        let matrix = square();
        let mut sol = Solution::from_tour(&matrix, vec![0, 2, 1, 3], "test");
        assert!(TwoOptSearch::new().improve(&matrix, &mut sol));
        assert!((sol.cost - 4.0).abs() < 1e-9);
        assert!(sol.is_complete(&matrix));
    }

    #[test]
    fn test_two_opt_keeps_local_optimum() {
        let matrix = square();
        let mut sol = Solution::from_tour(&matrix, vec![0, 1, 2, 3], "test");
        assert!(!TwoOptSearch::first_improvement().improve(&matrix, &mut sol));
        assert_eq!(sol.tour, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_vnd_never_worsens_and_cost_is_exact() {
        let matrix = DistanceMatrix::random_euclidean(15, 21);
        let tour: Vec<usize> = (0..15).rev().collect();
        let mut sol = Solution::from_tour(&matrix, tour, "test");
        let before = sol.cost;
        VND::default().improve(&matrix, &mut sol);
        assert!(sol.cost <= before + 1e-9);
        assert!(sol.is_complete(&matrix));
        assert!((sol.cost - matrix.tour_cost(&sol.tour)).abs() < 1e-6);
    }

    #[test]
    fn test_or_opt_moves_misplaced_city() {
        let matrix = square();
        let mut sol = Solution::from_tour(&matrix, vec![0, 2, 1, 3], "test");
        assert!(OrOptSearch::new().improve(&matrix, &mut sol));
        assert!((sol.cost - 4.0).abs() < 1e-9);
    }
}
