//! Reconstruction of a city sequence from an integral edge selection.

use crate::error::{Result, SolverError};
use crate::exact::relaxation::EdgeValues;
use crate::exact::subtour::INTEGRAL_THRESHOLD;

/// Walks successors from city 0 and checks the walk is one Hamiltonian cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct TourAssembler;

impl TourAssembler {
    /// `context` is attached to any `MalformedTour` error (node id, fixings).
    pub fn assemble(values: &EdgeValues, context: &str) -> Result<Vec<usize>> {
        let n = values.dimension();
        if n == 0 {
            return Err(SolverError::malformed_tour("empty edge selection", context));
        }

        let mut successor: Vec<Option<usize>> = vec![None; n];
        for ((i, j), _) in values.support(INTEGRAL_THRESHOLD) {
            if successor[i].is_some() {
                return Err(SolverError::malformed_tour(
                    format!("city {} has more than one successor", i),
                    context,
                ));
            }
            successor[i] = Some(j);
        }

        let mut visited = vec![false; n];
        let mut tour = Vec::with_capacity(n);
        let mut current = 0;
        loop {
            if visited[current] {
                return Err(SolverError::malformed_tour(
                    format!("city {} visited twice before closing", current),
                    context,
                ));
            }
            visited[current] = true;
            tour.push(current);

            let next = successor[current].ok_or_else(|| {
                SolverError::malformed_tour(format!("city {} has no successor", current), context)
            })?;
            if next == 0 {
                break;
            }
            current = next;
        }

        if tour.len() < n {
            return Err(SolverError::malformed_tour(
                format!("cycle through city 0 visits {} of {} cities", tour.len(), n),
                context,
            ));
        }

        Ok(tour)
    }
}

/// Check a sequence is a permutation of `0..n`
pub fn validate_tour(tour: &[usize], n: usize) -> Result<()> {
    if tour.len() != n {
        return Err(SolverError::malformed_tour(
            format!("tour has {} cities, expected {}", tour.len(), n),
            "final validation",
        ));
    }
    let mut seen = vec![false; n];
    for &city in tour {
        if city >= n {
            return Err(SolverError::InvalidIndex {
                index: city,
                dimension: n,
            });
        }
        if seen[city] {
            return Err(SolverError::malformed_tour(
                format!("city {} appears twice", city),
                "final validation",
            ));
        }
        seen[city] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_starts_at_zero() {
        let values = EdgeValues::from_tour(5, &[3, 1, 0, 4, 2]);
        let tour = TourAssembler::assemble(&values, "test").unwrap();
        assert_eq!(tour, vec![0, 4, 2, 3, 1]);
        assert!(validate_tour(&tour, 5).is_ok());
    }

    #[test]
    fn test_subtour_is_malformed() {
        let mut values = EdgeValues::zeros(4);
        for (i, j) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
            values.set(i, j, 1.0);
        }
        let err = TourAssembler::assemble(&values, "node 7").unwrap_err();
        match err {
            SolverError::MalformedTour { reason, context } => {
                assert!(reason.contains("2 of 4"));
                assert_eq!(context, "node 7");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_successor_and_revisit() {
        let mut values = EdgeValues::zeros(3);
        values.set(0, 1, 1.0);
        assert!(TourAssembler::assemble(&values, "").is_err());

        // 0 -> 1 -> 2 -> 1: city 1 is reached twice
        values.set(1, 2, 1.0);
        values.set(2, 1, 1.0);
        assert!(matches!(
            TourAssembler::assemble(&values, ""),
            Err(SolverError::MalformedTour { .. })
        ));
    }

    #[test]
    fn test_validate_tour() {
        assert!(validate_tour(&[0, 2, 1], 3).is_ok());
        assert!(validate_tour(&[0, 2, 2], 3).is_err());
        assert!(validate_tour(&[0, 1], 3).is_err());
        assert!(matches!(
            validate_tour(&[0, 5, 1], 3),
            Err(SolverError::InvalidIndex { index: 5, .. })
        ));
    }
}
