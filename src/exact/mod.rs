//! Exact branch-and-cut solver.
//!
//! The relaxation is the assignment problem over directed edges; subtours are
//! removed lazily with subtour elimination cuts, and the remaining
//! fractional points are resolved by branching on single edges.

pub mod branch_bound;
pub mod cuts;
pub mod driver;
pub mod relaxation;
pub mod subtour;
pub mod tour;

pub use branch_bound::{BranchAndBound, Branching, NodeState, SearchStats, Termination};
pub use cuts::{CutPool, CuttingPlaneGenerator, SubtourCut};
pub use driver::{SolverConfig, TspSolver};
pub use relaxation::{Edge, EdgeFixings, EdgeValues, Relaxation, RelaxationSolver};
pub use subtour::SubtourDetector;
pub use tour::{validate_tour, TourAssembler};
