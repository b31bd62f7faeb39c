//! Linear relaxation of the directed TSP at a search node.
//!
//! The LP is the assignment problem (one unit of flow out of and into every
//! city) restricted by the node's arc fixings and tightened by the global
//! subtour-elimination cuts:
//!
//! ```text
//! min  sum c_ij x_ij
//! s.t. sum_j x_ij = 1                 for every city i
//!      sum_i x_ij = 1                 for every city j
//!      sum_{i,j in S} x_ij <= |S| - 1 for every cut S in the pool
//!      x_ij >= 0
//! ```
//!
//! Fixings never become rows: a forced-out arc is a dropped column, and a
//! forced-in arc `(i, j)` drops every other arc leaving `i` or entering `j`,
//! so the assignment rows pin `x_ij` to 1.
//!
//! It is solved with a dense two-phase primal simplex. Dantzig pricing is used
//! until a run of degenerate pivots is seen, then Bland's rule takes over so
//! the (very degenerate) assignment polytope cannot make it cycle.

use crate::error::{Result, SolverError};
use crate::exact::cuts::SubtourCut;
use crate::instance::DistanceMatrix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Directed edge `(from, to)`
pub type Edge = (usize, usize);

/// Edge decisions accumulated along a search-tree path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeFixings {
    pub forced_in: Vec<Edge>,
    pub forced_out: Vec<Edge>,
}

impl EdgeFixings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forced_in(&self, edge: Edge) -> Self {
        let mut next = self.clone();
        next.forced_in.push(edge);
        next
    }

    pub fn with_forced_out(&self, edge: Edge) -> Self {
        let mut next = self.clone();
        next.forced_out.push(edge);
        next
    }

    pub fn is_forced_in(&self, edge: Edge) -> bool {
        self.forced_in.contains(&edge)
    }

    pub fn len(&self) -> usize {
        self.forced_in.len() + self.forced_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for EdgeFixings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in={:?} out={:?}", self.forced_in, self.forced_out)
    }
}

/// Dense N x N table of edge values from a relaxation
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeValues {
    n: usize,
    values: Vec<f64>,
}

impl EdgeValues {
    pub fn zeros(n: usize) -> Self {
        EdgeValues {
            n,
            values: vec![0.0; n * n],
        }
    }

    /// Integral edge selection of a closed tour
    pub fn from_tour(n: usize, tour: &[usize]) -> Self {
        let mut values = Self::zeros(n);
        for k in 0..tour.len() {
            values.set(tour[k], tour[(k + 1) % tour.len()], 1.0);
        }
        values
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.n + j] = value;
    }

    /// Edges with value above `threshold`, in lexicographic order
    pub fn support(&self, threshold: f64) -> impl Iterator<Item = (Edge, f64)> + '_ {
        (0..self.n).flat_map(move |i| {
            (0..self.n)
                .filter(move |&j| j != i)
                .map(move |j| ((i, j), self.get(i, j)))
                .filter(move |&(_, v)| v > threshold)
        })
    }

    pub fn is_integral(&self, tolerance: f64) -> bool {
        self.values
            .iter()
            .all(|&v| v <= tolerance || v >= 1.0 - tolerance)
    }

    pub fn objective(&self, matrix: &DistanceMatrix) -> f64 {
        self.support(0.0)
            .map(|((i, j), v)| v * matrix.distance(i, j))
            .sum()
    }
}

/// Result of relaxing one node
#[derive(Debug, Clone)]
pub enum Relaxation {
    Solved { values: EdgeValues, objective: f64 },
    /// No assignment satisfies the fixings and cuts
    Infeasible,
}

impl Relaxation {
    pub fn bound(&self) -> Option<f64> {
        match self {
            Relaxation::Solved { objective, .. } => Some(*objective),
            Relaxation::Infeasible => None,
        }
    }
}

/// Per-node LP solver
pub struct RelaxationSolver<'a> {
    matrix: &'a DistanceMatrix,
    /// Pivot / feasibility tolerance
    pub tolerance: f64,
    /// Pivots allowed per phase before giving up
    pub max_iterations: usize,
}

impl<'a> RelaxationSolver<'a> {
    pub fn new(matrix: &'a DistanceMatrix) -> Self {
        RelaxationSolver {
            matrix,
            tolerance: 1e-9,
            max_iterations: 200_000,
        }
    }

    /// Solve the relaxation for the given fixings and cut pool
    pub fn solve(&self, fixings: &EdgeFixings, cuts: &[Arc<SubtourCut>]) -> Result<Relaxation> {
        let n = self.matrix.dimension();
        if n < 2 {
            return Ok(Relaxation::Infeasible);
        }

        let columns = match self.active_arcs(fixings)? {
            Some(columns) => columns,
            None => return Ok(Relaxation::Infeasible),
        };

        let mut member = vec![false; n];
        let mut cut_rows: Vec<(Vec<usize>, f64)> = Vec::with_capacity(cuts.len());
        for cut in cuts {
            if cut.members().len() >= n {
                continue;
            }
            member.iter_mut().for_each(|m| *m = false);
            for &c in cut.members() {
                member[c] = true;
            }
            let entries: Vec<usize> = columns
                .iter()
                .enumerate()
                .filter(|(_, &(i, j))| member[i] && member[j])
                .map(|(col, _)| col)
                .collect();
            if !entries.is_empty() {
                cut_rows.push((entries, cut.rhs()));
            }
        }

        let mut tableau = Tableau::build(n, &columns, &cut_rows);

        // Phase I: drive the artificials of the assignment rows out.
        let phase_one_cost: Vec<f64> = (0..tableau.width)
            .map(|c| if tableau.is_artificial(c) { 1.0 } else { 0.0 })
            .collect();
        tableau.set_objective(&phase_one_cost);
        tableau.optimize(self.tolerance, self.max_iterations, |_| true)?;

        if tableau.objective_value() > 1e-7 {
            log::trace!("relaxation infeasible for fixings {}", fixings);
            return Ok(Relaxation::Infeasible);
        }
        tableau.evict_artificials(self.tolerance);

        // Phase II on the arc costs, artificials barred from re-entering.
        let mut cost = vec![0.0; tableau.width];
        for (col, &(i, j)) in columns.iter().enumerate() {
            cost[col] = self.matrix.distance(i, j);
        }
        tableau.set_objective(&cost);
        let first_artificial = tableau.first_artificial;
        tableau.optimize(self.tolerance, self.max_iterations, |c| c < first_artificial)?;

        let mut values = EdgeValues::zeros(n);
        for (row, &basic) in tableau.basis.iter().enumerate() {
            if basic < columns.len() {
                let (i, j) = columns[basic];
                let v = tableau.rhs[row].clamp(0.0, 1.0);
                values.set(i, j, if v < 1e-12 { 0.0 } else { v });
            }
        }
        let objective = values.objective(self.matrix);

        Ok(Relaxation::Solved { values, objective })
    }

    /// Columns allowed under the fixings, or `None` when the fixings
    /// contradict each other (a quick infeasibility proof).
    fn active_arcs(&self, fixings: &EdgeFixings) -> Result<Option<Vec<Edge>>> {
        let n = self.matrix.dimension();
        let mut succ: Vec<Option<usize>> = vec![None; n];
        let mut pred: Vec<Option<usize>> = vec![None; n];

        for &(i, j) in &fixings.forced_in {
            for index in [i, j] {
                if index >= n {
                    return Err(SolverError::InvalidIndex { index, dimension: n });
                }
            }
            if i == j || fixings.forced_out.contains(&(i, j)) {
                return Ok(None);
            }
            if succ[i].map_or(false, |s| s != j) || pred[j].map_or(false, |p| p != i) {
                return Ok(None);
            }
            succ[i] = Some(j);
            pred[j] = Some(i);
        }

        // Forced arcs closing a cycle shorter than N can never be completed.
        for start in 0..n {
            let mut len = 0;
            let mut current = start;
            while let Some(next) = succ[current] {
                len += 1;
                current = next;
                if current == start {
                    if len < n {
                        return Ok(None);
                    }
                    break;
                }
                if len > n {
                    break;
                }
            }
        }

        let mut forced_out = vec![false; n * n];
        for &(i, j) in &fixings.forced_out {
            for index in [i, j] {
                if index >= n {
                    return Err(SolverError::InvalidIndex { index, dimension: n });
                }
            }
            forced_out[i * n + j] = true;
        }

        let mut columns = Vec::with_capacity(n * (n - 1));
        let mut out_degree = vec![0usize; n];
        let mut in_degree = vec![0usize; n];
        for i in 0..n {
            for j in 0..n {
                if i == j || forced_out[i * n + j] {
                    continue;
                }
                if succ[i].map_or(false, |s| s != j) || pred[j].map_or(false, |p| p != i) {
                    continue;
                }
                columns.push((i, j));
                out_degree[i] += 1;
                in_degree[j] += 1;
            }
        }

        if out_degree.iter().chain(in_degree.iter()).any(|&d| d == 0) {
            return Ok(None);
        }

        Ok(Some(columns))
    }
}

/// Dense simplex tableau in standard form `A x = b, x >= 0, b >= 0`.
///
/// Column layout: arc columns, then one slack per cut row, then one
/// artificial per assignment row.
struct Tableau {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    basis: Vec<usize>,
    reduced: Vec<f64>,
    value: f64,
    width: usize,
    first_artificial: usize,
}

impl Tableau {
    fn build(n: usize, columns: &[Edge], cut_rows: &[(Vec<usize>, f64)]) -> Self {
        let arcs = columns.len();
        let slacks = cut_rows.len();
        let first_artificial = arcs + slacks;
        let width = first_artificial + 2 * n;
        let height = 2 * n + slacks;

        let mut rows = vec![vec![0.0; width]; height];
        let mut rhs = vec![0.0; height];
        let mut basis = Vec::with_capacity(height);

        for (col, &(i, j)) in columns.iter().enumerate() {
            rows[i][col] = 1.0;
            rows[n + j][col] = 1.0;
        }
        for r in 0..2 * n {
            rows[r][first_artificial + r] = 1.0;
            rhs[r] = 1.0;
            basis.push(first_artificial + r);
        }
        for (k, (entries, bound)) in cut_rows.iter().enumerate() {
            let r = 2 * n + k;
            for &col in entries {
                rows[r][col] = 1.0;
            }
            rows[r][arcs + k] = 1.0;
            rhs[r] = *bound;
            basis.push(arcs + k);
        }

        Tableau {
            rows,
            rhs,
            basis,
            reduced: vec![0.0; width],
            value: 0.0,
            width,
            first_artificial,
        }
    }

    fn is_artificial(&self, col: usize) -> bool {
        col >= self.first_artificial
    }

    fn objective_value(&self) -> f64 {
        self.value
    }

    /// Price out the basis for a new cost vector
    fn set_objective(&mut self, cost: &[f64]) {
        self.reduced.copy_from_slice(cost);
        self.value = 0.0;
        for (r, &basic) in self.basis.iter().enumerate() {
            let cb = cost[basic];
            if cb == 0.0 {
                continue;
            }
            for (c, entry) in self.rows[r].iter().enumerate() {
                self.reduced[c] -= cb * entry;
            }
            self.value += cb * self.rhs[r];
        }
    }

    fn optimize<F: Fn(usize) -> bool>(
        &mut self,
        tolerance: f64,
        max_iterations: usize,
        can_enter: F,
    ) -> Result<()> {
        let mut degenerate_streak = 0usize;
        let mut bland = false;

        for _ in 0..max_iterations {
            let entering = if bland {
                (0..self.width).find(|&c| can_enter(c) && self.reduced[c] < -tolerance)
            } else {
                let mut best: Option<(usize, f64)> = None;
                for c in 0..self.width {
                    let d = self.reduced[c];
                    if d < -tolerance && can_enter(c) && best.map_or(true, |(_, b)| d < b) {
                        best = Some((c, d));
                    }
                }
                best.map(|(c, _)| c)
            };

            let col = match entering {
                Some(col) => col,
                None => return Ok(()),
            };

            let mut leaving: Option<(usize, f64)> = None;
            for r in 0..self.rows.len() {
                let a = self.rows[r][col];
                if a <= tolerance {
                    continue;
                }
                let ratio = self.rhs[r] / a;
                leaving = match leaving {
                    None => Some((r, ratio)),
                    Some((best_r, best_ratio)) => {
                        if ratio < best_ratio - 1e-12
                            || (ratio <= best_ratio + 1e-12 && self.basis[r] < self.basis[best_r])
                        {
                            Some((r, ratio))
                        } else {
                            Some((best_r, best_ratio))
                        }
                    }
                };
            }

            let (row, ratio) = leaving.ok_or_else(|| {
                SolverError::numerical("relaxation reported unbounded on a bounded polytope")
            })?;

            if ratio <= 1e-12 {
                degenerate_streak += 1;
                if degenerate_streak > 50 {
                    bland = true;
                }
            } else {
                degenerate_streak = 0;
            }

            self.pivot(row, col);
        }

        Err(SolverError::numerical(format!(
            "simplex did not converge within {} pivots",
            max_iterations
        )))
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let pivot = self.rows[row][col];
        for entry in self.rows[row].iter_mut() {
            *entry /= pivot;
        }
        self.rhs[row] /= pivot;

        let pivot_row = self.rows[row].clone();
        let pivot_rhs = self.rhs[row];

        for r in 0..self.rows.len() {
            if r == row {
                continue;
            }
            let factor = self.rows[r][col];
            if factor.abs() < 1e-15 {
                continue;
            }
            for (entry, &p) in self.rows[r].iter_mut().zip(pivot_row.iter()) {
                *entry -= factor * p;
            }
            self.rows[r][col] = 0.0;
            self.rhs[r] -= factor * pivot_rhs;
            if self.rhs[r] < 0.0 && self.rhs[r] > -1e-11 {
                self.rhs[r] = 0.0;
            }
        }

        let factor = self.reduced[col];
        if factor != 0.0 {
            for (entry, &p) in self.reduced.iter_mut().zip(pivot_row.iter()) {
                *entry -= factor * p;
            }
            self.reduced[col] = 0.0;
            self.value += factor * pivot_rhs;
        }

        self.basis[row] = col;
    }

    /// Swap zero-level artificials out of the basis where a structural column
    /// can replace them. Rows where none can are redundant and stay inert.
    fn evict_artificials(&mut self, tolerance: f64) {
        for row in 0..self.basis.len() {
            if !self.is_artificial(self.basis[row]) {
                continue;
            }
            let replacement =
                (0..self.first_artificial).find(|&c| self.rows[row][c].abs() > tolerance.max(1e-7));
            if let Some(col) = replacement {
                self.rhs[row] = 0.0;
                self.pivot(row, col);
            }
        }
    }
}
