//! TSP Branch-and-Cut Solver Library
//!
//! An exact solver for the (possibly asymmetric) Traveling Salesman Problem.
//!
//! # Features
//!
//! - Assignment relaxation solved by a dense primal simplex
//! - Lazy subtour elimination cuts (component and min-cut separation)
//! - Best-bound-first branch and bound on single edges, optionally parallel
//! - Nearest neighbour + local search warm start
//! - CSV and TSPLIB instance loading, benchmarking and result logging
//!
//! # Example
//!
//! ```no_run
//! use tsp_bnc::instance::DistanceMatrix;
//! use tsp_bnc::exact::{SolverConfig, TspSolver};
//! use tsp_bnc::solution::SolveOutcome;
//!
//! let matrix = DistanceMatrix::from_file("TSP_50_002.csv").unwrap();
//! let solver = TspSolver::new(SolverConfig { time_limit: 30.0, ..Default::default() });
//!
//! match solver.solve(&matrix).unwrap() {
//!     SolveOutcome::Solved(result) => println!("Tour cost: {:.2}", result.total_cost),
//!     SolveOutcome::NoFeasibleSolution { reason, .. } => println!("No tour: {}", reason),
//! }
//! ```

pub mod error;
pub mod instance;
pub mod solution;
pub mod heuristics;
pub mod exact;
pub mod benchmark;

pub use error::{Result, SolverError};
pub use exact::{SolverConfig, TspSolver};
pub use instance::DistanceMatrix;
pub use solution::{SolveOutcome, SolveResult, Solution};
