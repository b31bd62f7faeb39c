//! Connected-component analysis of an edge selection.

use crate::exact::relaxation::EdgeValues;

/// Threshold for reading an integral selection
pub const INTEGRAL_THRESHOLD: f64 = 0.5;
/// Threshold for the support graph of a fractional point
pub const SUPPORT_THRESHOLD: f64 = 1e-6;

/// Finds the components of the undirected graph induced by edges whose
/// value exceeds `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct SubtourDetector {
    pub threshold: f64,
}

impl SubtourDetector {
    pub fn new(threshold: f64) -> Self {
        SubtourDetector { threshold }
    }

    pub fn integral() -> Self {
        Self::new(INTEGRAL_THRESHOLD)
    }

    pub fn support() -> Self {
        Self::new(SUPPORT_THRESHOLD)
    }

    /// Components as sorted city lists, ordered by their smallest city
    pub fn components(&self, values: &EdgeValues) -> Vec<Vec<usize>> {
        let n = values.dimension();
        let mut parent: Vec<usize> = (0..n).collect();

        for ((i, j), _) in values.support(self.threshold) {
            let a = find(&mut parent, i);
            let b = find(&mut parent, j);
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n];
        for city in 0..n {
            let root = find(&mut parent, city);
            groups[root].push(city);
        }
        groups.retain(|g| !g.is_empty());
        groups
    }

    /// Components smaller than the whole city set
    pub fn subtours(&self, values: &EdgeValues) -> Vec<Vec<usize>> {
        let n = values.dimension();
        self.components(values)
            .into_iter()
            .filter(|c| c.len() < n)
            .collect()
    }

    /// True iff the selection is one Hamiltonian cycle: integral, every city
    /// with exactly one selected successor and predecessor, one component.
    pub fn is_full_tour(&self, values: &EdgeValues, tolerance: f64) -> bool {
        let n = values.dimension();
        if n < 2 || !values.is_integral(tolerance) {
            return false;
        }

        let mut out_degree = vec![0usize; n];
        let mut in_degree = vec![0usize; n];
        for ((i, j), _) in values.support(self.threshold) {
            out_degree[i] += 1;
            in_degree[j] += 1;
        }
        if out_degree.iter().chain(in_degree.iter()).any(|&d| d != 1) {
            return false;
        }

        self.components(values).len() == 1
    }
}

impl Default for SubtourDetector {
    fn default() -> Self {
        Self::integral()
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_tour() {
        let values = EdgeValues::from_tour(5, &[0, 3, 1, 4, 2]);
        let detector = SubtourDetector::integral();
        assert!(detector.is_full_tour(&values, 1e-6));
        assert_eq!(detector.components(&values), vec![vec![0, 1, 2, 3, 4]]);
        assert!(detector.subtours(&values).is_empty());
    }

    #[test]
    fn test_two_subtours() {
        let mut values = EdgeValues::zeros(5);
        for (i, j) in [(0, 2), (2, 0), (1, 3), (3, 4), (4, 1)] {
            values.set(i, j, 1.0);
        }
        let detector = SubtourDetector::integral();
        assert!(!detector.is_full_tour(&values, 1e-6));
        assert_eq!(detector.subtours(&values), vec![vec![0, 2], vec![1, 3, 4]]);
    }

    #[test]
    fn test_threshold_matters_for_fractional_points() {
        // Half-weight cycle 0-1-2-3 plus half-weight 2-cycles {0,1} and {2,3}
        let mut values = EdgeValues::zeros(4);
        for (i, j) in [(0, 1), (1, 2), (2, 3), (3, 0), (1, 0), (3, 2)] {
            values.set(i, j, 0.5);
        }
        let support = SubtourDetector::support();
        assert_eq!(support.components(&values).len(), 1);
        assert!(!support.is_full_tour(&values, 1e-6));

        let rounded = SubtourDetector::new(0.6);
        assert_eq!(rounded.components(&values).len(), 4);
    }

    #[test]
    fn test_degree_violation_is_not_a_tour() {
        // connected, integral, but city 0 has two successors
        let mut values = EdgeValues::zeros(3);
        for (i, j) in [(0, 1), (0, 2), (1, 0), (2, 1)] {
            values.set(i, j, 1.0);
        }
        assert!(!SubtourDetector::integral().is_full_tour(&values, 1e-6));
    }
}
