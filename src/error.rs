//! Error taxonomy for the solver and its input/output adapters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Malformed or missing input data; the solve is not attempted.
    #[error("input error: {0}")]
    InputError(String),
    /// Access outside `[0, N)` in the distance matrix.
    #[error("city index {index} out of range for {dimension} cities")]
    InvalidIndex { index: usize, dimension: usize },
    /// An integral node could not be turned into a single Hamiltonian cycle.
    #[error("malformed tour: {reason} ({context})")]
    MalformedTour { reason: String, context: String },
    /// The relaxation stalled (iteration limit or lost feasibility).
    #[error("numerical failure: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

impl SolverError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputError(message.into())
    }

    pub fn malformed_tour(reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MalformedTour {
            reason: reason.into(),
            context: context.into(),
        }
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    /// Internal-consistency failures that must abort a solve.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InvalidIndex { .. } | Self::MalformedTour { .. } | Self::Numerical(_)
        )
    }

    /// Process exit code for the binary: 3 for internal failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_internal() {
            3
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        assert!(SolverError::InvalidIndex { index: 5, dimension: 3 }.is_internal());
        assert!(SolverError::malformed_tour("short cycle", "node 3").is_internal());
        assert!(!SolverError::input("empty file").is_internal());
    }

    #[test]
    fn test_exit_codes_separate_internal_failures() {
        assert_eq!(SolverError::numerical("iteration limit").exit_code(), 3);
        assert_eq!(SolverError::malformed_tour("short cycle", "node 3").exit_code(), 3);
        assert_eq!(SolverError::input("no rows").exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        assert_eq!(SolverError::from(io).exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        let err = SolverError::InvalidIndex { index: 7, dimension: 4 };
        assert_eq!(err.to_string(), "city index 7 out of range for 4 cities");
        let err = SolverError::input("no rows");
        assert_eq!(err.to_string(), "input error: no rows");
    }
}
