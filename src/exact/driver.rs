//! Top-level entry point of the exact solver.
//!
//! [`TspSolver`] wires the pieces together: optional heuristic warm start,
//! root relaxation, branch-and-cut search under a wall-clock limit, and a
//! final check of the reported tour against the matrix.

use crate::error::{Result, SolverError};
use crate::exact::branch_bound::{BranchAndBound, SearchStats, Termination};
use crate::exact::tour::validate_tour;
use crate::heuristics;
use crate::instance::DistanceMatrix;
use crate::solution::{relative_gap, NoSolutionReason, SolveOutcome, SolveResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Exact solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Time limit in seconds
    pub time_limit: f64,
    /// Cut rounds per node before branching
    pub max_cut_rounds: usize,
    /// Stop after this many node expansions
    pub node_limit: Option<usize>,
    /// Nodes expanded concurrently (1 = sequential and deterministic)
    pub threads: usize,
    /// Seed the incumbent with nearest neighbour + local search
    pub warm_start: bool,
    /// Distance from 0/1 under which an edge value counts as integral
    pub integrality_tolerance: f64,
    /// Fall back to min-cut separation when components find nothing
    pub min_cut_separation: bool,
    /// Expanded nodes between progress lines (0 disables them)
    pub log_interval: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            time_limit: 60.0,
            max_cut_rounds: 25,
            node_limit: None,
            threads: 1,
            warm_start: false,
            integrality_tolerance: 1e-6,
            min_cut_separation: true,
            log_interval: 1000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.time_limit.is_nan() || self.time_limit < 0.0 {
            return Err(SolverError::input(format!(
                "time limit must be a non-negative number of seconds, got {}",
                self.time_limit
            )));
        }
        if !(self.integrality_tolerance > 0.0 && self.integrality_tolerance < 0.5) {
            return Err(SolverError::input(format!(
                "integrality tolerance must be in (0, 0.5), got {}",
                self.integrality_tolerance
            )));
        }
        Ok(())
    }

    fn deadline(&self, start: Instant) -> Instant {
        let far = u32::MAX as f64;
        let budget = Duration::from_secs_f64(self.time_limit.min(far));
        start.checked_add(budget).unwrap_or(start + Duration::from_secs(86_400))
    }
}

/// Exact branch-and-cut solver for the (asymmetric) TSP
pub struct TspSolver {
    config: SolverConfig,
}

impl TspSolver {
    pub fn new(config: SolverConfig) -> Self {
        TspSolver { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve to proven optimality or until the time or node limit is hit
    pub fn solve(&self, matrix: &DistanceMatrix) -> Result<SolveOutcome> {
        self.config.validate()?;
        let start = Instant::now();
        let deadline = self.config.deadline(start);
        let n = matrix.dimension();

        log::info!(
            "solving {} ({} cities, time limit {}s)",
            matrix.name,
            n,
            self.config.time_limit
        );

        if n < 2 {
            return Ok(SolveOutcome::NoFeasibleSolution {
                lower_bound: 0.0,
                elapsed: start.elapsed().as_secs_f64(),
                reason: NoSolutionReason::TooFewCities,
            });
        }

        if n == 2 {
            let tour = vec![0, 1];
            let total_cost = matrix.checked_tour_cost(&tour)?;
            return Ok(SolveOutcome::Solved(SolveResult {
                instance: matrix.name.clone(),
                dimension: n,
                tour,
                total_cost,
                lower_bound: total_cost,
                root_bound: total_cost,
                gap: 0.0,
                elapsed: start.elapsed().as_secs_f64(),
                proven_optimal: true,
                termination: Termination::Exhausted,
                warm_start_cost: None,
                stats: SearchStats::default(),
            }));
        }

        let mut engine = BranchAndBound::new(matrix, &self.config);

        let mut warm_start_cost = None;
        if self.config.warm_start {
            if let Some(solution) = heuristics::warm_start(matrix) {
                warm_start_cost = Some(solution.cost);
                engine.seed_incumbent(solution.tour);
            }
        }

        let root_bound = match engine.relax_root()? {
            Some(bound) => bound,
            None => {
                return Ok(SolveOutcome::NoFeasibleSolution {
                    lower_bound: 0.0,
                    elapsed: start.elapsed().as_secs_f64(),
                    reason: NoSolutionReason::Infeasible,
                })
            }
        };

        let summary = engine.run(deadline)?;
        let elapsed = start.elapsed().as_secs_f64();

        let incumbent = match summary.incumbent {
            Some(incumbent) => incumbent,
            None => {
                let reason = match summary.termination {
                    Termination::TimeLimit => NoSolutionReason::TimeLimit,
                    Termination::NodeLimit => NoSolutionReason::NodeLimit,
                    Termination::Exhausted => NoSolutionReason::Infeasible,
                };
                let lower_bound = summary.lower_bound.unwrap_or(root_bound);
                log::info!("no tour found ({}), bound {:.4}", reason, lower_bound);
                return Ok(SolveOutcome::NoFeasibleSolution {
                    lower_bound,
                    elapsed,
                    reason,
                });
            }
        };

        let mut tour = incumbent.tour;
        validate_tour(&tour, n)?;
        if let Some(zero) = tour.iter().position(|&c| c == 0) {
            tour.rotate_left(zero);
        }
        let total_cost = matrix.checked_tour_cost(&tour)?;

        let proven_optimal = summary.termination == Termination::Exhausted;
        let lower_bound = if proven_optimal {
            total_cost
        } else {
            summary.lower_bound.unwrap_or(root_bound).min(total_cost)
        };
        let gap = relative_gap(total_cost, lower_bound);

        log::info!(
            "{}: cost {:.4}, bound {:.4}, gap {:.4}%, {} nodes, {:.3}s",
            matrix.name,
            total_cost,
            lower_bound,
            gap * 100.0,
            summary.stats.nodes_expanded,
            elapsed
        );

        Ok(SolveOutcome::Solved(SolveResult {
            instance: matrix.name.clone(),
            dimension: n,
            tour,
            total_cost,
            lower_bound,
            root_bound,
            gap,
            elapsed,
            proven_optimal,
            termination: summary.termination,
            warm_start_cost,
            stats: summary.stats,
        }))
    }
}

impl Default for TspSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::relaxation::{EdgeFixings, RelaxationSolver};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn quiet() -> SolverConfig {
        SolverConfig {
            log_interval: 0,
            ..Default::default()
        }
    }

    fn solved(outcome: SolveOutcome) -> SolveResult {
        match outcome {
            SolveOutcome::Solved(result) => result,
            other => panic!("expected a tour, got {:?}", other),
        }
    }

    fn brute_force(matrix: &DistanceMatrix) -> f64 {
        fn extend(matrix: &DistanceMatrix, tour: &mut Vec<usize>, used: &mut [bool], best: &mut f64) {
            if tour.len() == used.len() {
                *best = best.min(matrix.tour_cost(tour));
                return;
            }
            for city in 1..used.len() {
                if !used[city] {
                    used[city] = true;
                    tour.push(city);
                    extend(matrix, tour, used, best);
                    tour.pop();
                    used[city] = false;
                }
            }
        }
        let n = matrix.dimension();
        let mut used = vec![false; n];
        used[0] = true;
        let mut best = f64::INFINITY;
        extend(matrix, &mut vec![0], &mut used, &mut best);
        best
    }

    fn random_asymmetric(n: usize, seed: u64) -> DistanceMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { 0.0 } else { rng.gen_range(1..100) as f64 })
                    .collect()
            })
            .collect();
        DistanceMatrix::new(rows).unwrap()
    }

    fn assert_valid(result: &SolveResult, matrix: &DistanceMatrix) {
        assert!(validate_tour(&result.tour, matrix.dimension()).is_ok());
        assert_eq!(result.tour[0], 0);
        assert!((result.total_cost - matrix.tour_cost(&result.tour)).abs() < 1e-6);
        assert!(result.lower_bound <= result.total_cost + 1e-6);
        assert!(result.root_bound <= result.total_cost + 1e-6);
    }

    #[test]
    fn test_four_city_scenario() {
        let matrix = DistanceMatrix::new(vec![
            vec![0.0, 10.0, 15.0, 20.0],
            vec![10.0, 0.0, 35.0, 25.0],
            vec![15.0, 35.0, 0.0, 30.0],
            vec![20.0, 25.0, 30.0, 0.0],
        ])
        .unwrap();
        let result = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        assert_valid(&result, &matrix);
        assert!((result.total_cost - 80.0).abs() < 1e-9);
        assert!(result.proven_optimal);
        assert_eq!(result.gap, 0.0);
        assert_eq!(result.lower_bound, result.total_cost);
    }

    #[test]
    fn test_single_city_has_no_tour() {
        let matrix = DistanceMatrix::new(vec![vec![0.0]]).unwrap();
        match TspSolver::default().solve(&matrix).unwrap() {
            SolveOutcome::NoFeasibleSolution {
                lower_bound,
                reason,
                ..
            } => {
                assert_eq!(lower_bound, 0.0);
                assert_eq!(reason, NoSolutionReason::TooFewCities);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_two_cities() {
        let matrix = DistanceMatrix::new(vec![vec![0.0, 3.0], vec![4.0, 0.0]]).unwrap();
        let result = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        assert_eq!(result.tour, vec![0, 1]);
        assert!((result.total_cost - 7.0).abs() < 1e-12);
        assert!(result.proven_optimal);
    }

    #[test]
    fn test_zero_time_limit_returns_root_bound() {
        let matrix = DistanceMatrix::random_euclidean(8, 2);
        let config = SolverConfig {
            time_limit: 0.0,
            ..quiet()
        };
        match TspSolver::new(config).solve(&matrix).unwrap() {
            SolveOutcome::NoFeasibleSolution {
                lower_bound,
                reason,
                ..
            } => {
                assert_eq!(reason, NoSolutionReason::TimeLimit);
                let root = RelaxationSolver::new(&matrix)
                    .solve(&EdgeFixings::new(), &[])
                    .unwrap()
                    .bound()
                    .unwrap();
                assert!((lower_bound - root).abs() < 1e-9);
                let full = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
                assert!(lower_bound <= full.total_cost + 1e-6);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_zero_time_limit_with_warm_start_reports_heuristic_tour() {
        let matrix = DistanceMatrix::random_euclidean(8, 2);
        let config = SolverConfig {
            time_limit: 0.0,
            warm_start: true,
            ..quiet()
        };
        let result = solved(TspSolver::new(config).solve(&matrix).unwrap());
        assert_valid(&result, &matrix);
        assert!(!result.proven_optimal);
        assert_eq!(result.warm_start_cost, Some(result.total_cost));
    }

    #[test]
    fn test_duplicate_cities_with_zero_distance() {
        let matrix = DistanceMatrix::new(vec![
            vec![0.0, 0.0, 5.0, 5.0, 7.0],
            vec![0.0, 0.0, 5.0, 5.0, 7.0],
            vec![5.0, 5.0, 0.0, 0.0, 3.0],
            vec![5.0, 5.0, 0.0, 0.0, 3.0],
            vec![7.0, 7.0, 3.0, 3.0, 0.0],
        ])
        .unwrap();
        let result = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        assert_valid(&result, &matrix);
        assert!((result.total_cost - brute_force(&matrix)).abs() < 1e-9);
        assert!(result.proven_optimal);
    }

    #[test]
    fn test_matches_brute_force_on_symmetric_instances() {
        for seed in 0..6 {
            let matrix = DistanceMatrix::random_euclidean(7, seed);
            let result = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
            assert_valid(&result, &matrix);
            assert!(result.proven_optimal);
            assert!(
                (result.total_cost - brute_force(&matrix)).abs() < 1e-6,
                "seed {}",
                seed
            );
        }
    }

    #[test]
    fn test_matches_brute_force_on_asymmetric_instances() {
        for seed in 0..6 {
            let matrix = random_asymmetric(7, 100 + seed);
            let result = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
            assert_valid(&result, &matrix);
            assert!(result.proven_optimal);
            assert!(
                (result.total_cost - brute_force(&matrix)).abs() < 1e-6,
                "seed {}",
                seed
            );
        }
    }

    #[test]
    fn test_warm_start_does_not_change_optimum() {
        let matrix = DistanceMatrix::random_euclidean(9, 42);
        let cold = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        let warm = solved(
            TspSolver::new(SolverConfig {
                warm_start: true,
                ..quiet()
            })
            .solve(&matrix)
            .unwrap(),
        );
        assert!((cold.total_cost - warm.total_cost).abs() < 1e-6);
        assert!(warm.warm_start_cost.unwrap() >= warm.total_cost - 1e-9);
    }

    #[test]
    fn test_sequential_search_is_deterministic() {
        let matrix = random_asymmetric(10, 9);
        let a = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        let b = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        assert_eq!(a.tour, b.tour);
        assert_eq!(a.total_cost, b.total_cost);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn test_larger_node_limit_never_worsens() {
        let matrix = DistanceMatrix::random_euclidean(12, 17);
        let mut previous: Option<(f64, f64)> = None;
        for limit in [Some(1), Some(3), Some(10), Some(40), None] {
            let config = SolverConfig {
                node_limit: limit,
                ..quiet()
            };
            let outcome = TspSolver::new(config).solve(&matrix).unwrap();
            let cost = outcome.result().map_or(f64::INFINITY, |r| r.total_cost);
            let bound = outcome.lower_bound();
            if let Some((prev_cost, prev_bound)) = previous {
                assert!(cost <= prev_cost + 1e-9, "limit {:?}", limit);
                assert!(bound >= prev_bound - 1e-9, "limit {:?}", limit);
            }
            previous = Some((cost, bound));
        }
    }

    #[test]
    fn test_parallel_search_finds_same_optimum() {
        let matrix = random_asymmetric(9, 77);
        let sequential = solved(TspSolver::new(quiet()).solve(&matrix).unwrap());
        let parallel = solved(
            TspSolver::new(SolverConfig {
                threads: 4,
                ..quiet()
            })
            .solve(&matrix)
            .unwrap(),
        );
        assert_valid(&parallel, &matrix);
        assert!(parallel.proven_optimal);
        assert!((sequential.total_cost - parallel.total_cost).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let matrix = DistanceMatrix::random_euclidean(5, 1);
        let config = SolverConfig {
            time_limit: -1.0,
            ..quiet()
        };
        assert!(matches!(
            TspSolver::new(config).solve(&matrix),
            Err(SolverError::InputError(_))
        ));
    }
}
