//! Tour and result representations.
//!
//! [`Solution`] is a working tour manipulated by the heuristics; the
//! [`SolveOutcome`] family is what the exact solver reports.

use crate::exact::branch_bound::{SearchStats, Termination};
use crate::instance::DistanceMatrix;
use serde::{Deserialize, Serialize};

/// A closed tour under construction or improvement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// City sequence; the edge back to `tour[0]` is implicit
    pub tour: Vec<usize>,
    /// Total tour cost including the closing edge
    pub cost: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    pub fn new() -> Self {
        Solution {
            tour: Vec::new(),
            cost: f64::INFINITY,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    pub fn from_tour(matrix: &DistanceMatrix, tour: Vec<usize>, algorithm: &str) -> Self {
        let cost = matrix.tour_cost(&tour);
        Solution {
            tour,
            cost,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Recompute the cost from the matrix
    pub fn validate(&mut self, matrix: &DistanceMatrix) {
        self.cost = matrix.tour_cost(&self.tour);
    }

    /// Check if all cities are visited exactly once
    pub fn is_complete(&self, matrix: &DistanceMatrix) -> bool {
        let n = matrix.dimension();
        if self.tour.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        self.tour
            .iter()
            .all(|&city| city < n && !std::mem::replace(&mut seen[city], true))
    }

    /// Get the node at a given position (circular)
    pub fn node_at(&self, pos: usize) -> usize {
        self.tour[pos % self.tour.len()]
    }

    /// Cost change of reversing `tour[i+1..=j]`.
    ///
    /// On an asymmetric matrix the reversed segment is traversed backwards,
    /// so its internal edges are re-priced as well.
    pub fn two_opt_delta(&self, matrix: &DistanceMatrix, i: usize, j: usize) -> f64 {
        let n = self.tour.len();
        if i >= j || j >= n {
            return 0.0;
        }
        let t = &self.tour;
        let a = t[i];
        let b = t[i + 1];
        let c = t[j];
        let d = self.node_at(j + 1);

        let mut delta = matrix.distance(a, c) + matrix.distance(b, d)
            - matrix.distance(a, b)
            - matrix.distance(c, d);
        for k in i + 1..j {
            delta += matrix.distance(t[k + 1], t[k]) - matrix.distance(t[k], t[k + 1]);
        }
        delta
    }

    /// Apply a 2-opt move (reverse segment between i+1 and j)
    pub fn apply_two_opt(&mut self, i: usize, j: usize) {
        self.tour[i + 1..=j].reverse();
    }

    /// Cost change of moving `len` cities starting at `start` so they follow
    /// the city currently at position `to`
    pub fn relocation_delta(&self, matrix: &DistanceMatrix, start: usize, len: usize, to: usize) -> f64 {
        let mut moved = self.tour.clone();
        if !relocate(&mut moved, start, len, to) {
            return 0.0;
        }
        matrix.tour_cost(&moved) - self.cost
    }

    pub fn apply_relocation(&mut self, start: usize, len: usize, to: usize) {
        relocate(&mut self.tour, start, len, to);
    }
}

fn relocate(tour: &mut Vec<usize>, start: usize, len: usize, to: usize) -> bool {
    if len == 0 || start + len > tour.len() || (start..start + len).contains(&to) || to >= tour.len() {
        return false;
    }
    let anchor = tour[to];
    let segment: Vec<usize> = tour.drain(start..start + len).collect();
    let pos = match tour.iter().position(|&c| c == anchor) {
        Some(p) => p + 1,
        None => return false,
    };
    for (k, city) in segment.into_iter().enumerate() {
        tour.insert(pos + k, city);
    }
    true
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Tour: {:?}", self.tour)
    }
}

/// `(upper - lower) / upper`, 0 when the upper bound is 0
pub fn relative_gap(upper: f64, lower: f64) -> f64 {
    if upper.abs() < 1e-12 {
        0.0
    } else {
        ((upper - lower) / upper.abs()).max(0.0)
    }
}

/// A tour found by the exact solver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Instance name
    pub instance: String,
    pub dimension: usize,
    /// Visit order starting at city 0
    pub tour: Vec<usize>,
    /// Cost recomputed from the matrix
    pub total_cost: f64,
    /// Best proven lower bound
    pub lower_bound: f64,
    /// Bound of the root relaxation
    pub root_bound: f64,
    /// Relative optimality gap
    pub gap: f64,
    /// Wall-clock seconds
    pub elapsed: f64,
    pub proven_optimal: bool,
    pub termination: Termination,
    /// Cost of the heuristic tour that seeded the search
    pub warm_start_cost: Option<f64>,
    pub stats: SearchStats,
}

/// Why no tour could be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoSolutionReason {
    /// Fewer than two cities
    TooFewCities,
    TimeLimit,
    NodeLimit,
    /// Search space exhausted without any Hamiltonian cycle
    Infeasible,
}

impl std::fmt::Display for NoSolutionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NoSolutionReason::TooFewCities => "fewer than two cities",
            NoSolutionReason::TimeLimit => "time limit reached before any tour was found",
            NoSolutionReason::NodeLimit => "node limit reached before any tour was found",
            NoSolutionReason::Infeasible => "no Hamiltonian cycle exists",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SolveOutcome {
    Solved(SolveResult),
    NoFeasibleSolution {
        lower_bound: f64,
        elapsed: f64,
        reason: NoSolutionReason,
    },
}

impl SolveOutcome {
    pub fn result(&self) -> Option<&SolveResult> {
        match self {
            SolveOutcome::Solved(result) => Some(result),
            SolveOutcome::NoFeasibleSolution { .. } => None,
        }
    }

    pub fn lower_bound(&self) -> f64 {
        match self {
            SolveOutcome::Solved(result) => result.lower_bound,
            SolveOutcome::NoFeasibleSolution { lower_bound, .. } => *lower_bound,
        }
    }

    pub fn elapsed(&self) -> f64 {
        match self {
            SolveOutcome::Solved(result) => result.elapsed,
            SolveOutcome::NoFeasibleSolution { elapsed, .. } => *elapsed,
        }
    }
}

impl std::fmt::Display for SolveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {} ({} cities)", self.instance, self.dimension)?;
        writeln!(f, "  Cost: {:.4}", self.total_cost)?;
        writeln!(f, "  Lower bound: {:.4} (root {:.4})", self.lower_bound, self.root_bound)?;
        writeln!(f, "  Gap: {:.4}%", self.gap * 100.0)?;
        writeln!(f, "  Optimal: {}", self.proven_optimal)?;
        writeln!(f, "  Time: {:.3}s", self.elapsed)?;
        writeln!(
            f,
            "  Nodes: {} explored, {} created, max depth {}",
            self.stats.nodes_expanded, self.stats.nodes_created, self.stats.max_depth
        )?;
        writeln!(f, "  Cuts: {}", self.stats.cuts_in_pool)?;
        writeln!(f, "  Tour: {:?}", self.tour)
    }
}

impl std::fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveOutcome::Solved(result) => result.fmt(f),
            SolveOutcome::NoFeasibleSolution {
                lower_bound,
                elapsed,
                reason,
            } => {
                writeln!(f, "No feasible solution: {}", reason)?;
                writeln!(f, "  Lower bound: {:.4}", lower_bound)?;
                writeln!(f, "  Time: {:.3}s", elapsed)
            }
        }
    }
}
