//! Subtour-elimination cuts and their separation.
//!
//! A cut over the city set `S` (2 <= |S| < N) is the directed inequality
//! `sum_{i,j in S, i != j} x_ij <= |S| - 1`. Every Hamiltonian cycle satisfies
//! it; a cycle through exactly the cities of `S` does not.
//!
//! Separation runs in two stages:
//! - components of the support graph and of the rounded (> 0.5) graph;
//! - when those yield nothing, a Stoer-Wagner global minimum cut over the
//!   symmetrised weights `x_ij + x_ji`. For an assignment-feasible point the
//!   weight of the cut around `S` is `2 (|S| - x(S))`, so a cut lighter than 2
//!   is exactly a violated subtour inequality.

use crate::exact::relaxation::EdgeValues;
use crate::exact::subtour::SubtourDetector;
use std::collections::HashSet;
use std::sync::Arc;

/// Amount by which a point must violate a cut before it is reported
pub const VIOLATION_TOLERANCE: f64 = 1e-6;

/// One subtour-elimination inequality, identified by its sorted member set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubtourCut {
    members: Vec<usize>,
}

impl SubtourCut {
    pub fn new(mut members: Vec<usize>) -> Self {
        members.sort_unstable();
        members.dedup();
        SubtourCut { members }
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn contains(&self, city: usize) -> bool {
        self.members.binary_search(&city).is_ok()
    }

    /// Right-hand side `|S| - 1`
    pub fn rhs(&self) -> f64 {
        (self.members.len() as f64 - 1.0).max(0.0)
    }

    /// Left-hand side evaluated at a point
    pub fn lhs(&self, values: &EdgeValues) -> f64 {
        let mut total = 0.0;
        for &i in &self.members {
            for &j in &self.members {
                if i != j {
                    total += values.get(i, j);
                }
            }
        }
        total
    }

    /// Positive when the point violates the cut
    pub fn violation(&self, values: &EdgeValues) -> f64 {
        self.lhs(values) - self.rhs()
    }

    /// Whether a closed tour satisfies the inequality
    pub fn admits_tour(&self, tour: &[usize]) -> bool {
        let inside = (0..tour.len())
            .filter(|&k| self.contains(tour[k]) && self.contains(tour[(k + 1) % tour.len()]))
            .count();
        inside as f64 <= self.rhs()
    }
}

/// Global, append-only, ordered cut list with member-set deduplication
#[derive(Debug, Default)]
pub struct CutPool {
    cuts: Vec<Arc<SubtourCut>>,
    seen: HashSet<Vec<usize>>,
}

impl CutPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cut unless one with the same member set exists
    pub fn insert(&mut self, cut: SubtourCut) -> Option<Arc<SubtourCut>> {
        if self.seen.contains(cut.members()) {
            return None;
        }
        self.seen.insert(cut.members().to_vec());
        let cut = Arc::new(cut);
        self.cuts.push(Arc::clone(&cut));
        Some(cut)
    }

    pub fn contains(&self, members: &[usize]) -> bool {
        self.seen.contains(members)
    }

    /// Shared handles to every cut, in insertion order
    pub fn snapshot(&self) -> Vec<Arc<SubtourCut>> {
        self.cuts.clone()
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}

/// Turns violated subtours of a relaxation point into cuts
#[derive(Debug, Clone)]
pub struct CuttingPlaneGenerator {
    /// Use the Stoer-Wagner separation on connected fractional points
    pub min_cut_separation: bool,
    /// Cap on cuts returned per call
    pub max_cuts_per_round: usize,
}

impl CuttingPlaneGenerator {
    pub fn new() -> Self {
        CuttingPlaneGenerator {
            min_cut_separation: true,
            max_cuts_per_round: 64,
        }
    }

    /// Candidate cuts violated by `values`, deduplicated among themselves
    /// and sorted by decreasing violation (ties by member set).
    pub fn separate(&self, values: &EdgeValues) -> Vec<SubtourCut> {
        let n = values.dimension();
        let mut candidates: Vec<Vec<usize>> = Vec::new();
        candidates.extend(SubtourDetector::support().subtours(values));
        candidates.extend(SubtourDetector::integral().subtours(values));

        let mut found = self.violated(values, candidates);

        if found.is_empty() && self.min_cut_separation && n >= 4 {
            if let Some(side) = min_cut_side(values) {
                found = self.violated(values, vec![side]);
            }
        }

        found.truncate(self.max_cuts_per_round);
        found
    }

    /// Separate and append to the pool; returns only the cuts that were new
    pub fn generate(&self, values: &EdgeValues, pool: &mut CutPool) -> Vec<Arc<SubtourCut>> {
        self.separate(values)
            .into_iter()
            .filter_map(|cut| pool.insert(cut))
            .collect()
    }

    fn violated(&self, values: &EdgeValues, candidates: Vec<Vec<usize>>) -> Vec<SubtourCut> {
        let n = values.dimension();
        let mut seen = HashSet::new();
        let mut cuts: Vec<(f64, SubtourCut)> = Vec::new();

        for members in candidates {
            if members.len() < 2 || members.len() >= n {
                continue;
            }
            let cut = SubtourCut::new(members);
            if !seen.insert(cut.members().to_vec()) {
                continue;
            }
            let violation = cut.violation(values);
            if violation > VIOLATION_TOLERANCE {
                cuts.push((violation, cut));
            }
        }

        cuts.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.members().cmp(b.1.members()))
        });
        cuts.into_iter().map(|(_, cut)| cut).collect()
    }
}

impl Default for CuttingPlaneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Undirected weights `x_ij + x_ji` of the support graph
fn symmetrised(values: &EdgeValues) -> Vec<Vec<f64>> {
    let n = values.dimension();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| if i == j { 0.0 } else { values.get(i, j) + values.get(j, i) })
                .collect()
        })
        .collect()
}

/// Smaller side of the global minimum cut when its weight is below 2
fn min_cut_side(values: &EdgeValues) -> Option<Vec<usize>> {
    let n = values.dimension();
    let (weight, mut side) = stoer_wagner(symmetrised(values));
    if weight > 2.0 - VIOLATION_TOLERANCE || side.is_empty() || side.len() >= n {
        return None;
    }
    side.sort_unstable();
    if side.len() * 2 > n {
        side = (0..n).filter(|c| side.binary_search(c).is_err()).collect();
    }
    Some(side)
}

/// Stoer-Wagner global minimum cut of a symmetric weight matrix.
///
/// Each phase grows a maximum-adjacency order over the remaining
/// super-vertices; the last vertex added is separated by the cut of the
/// phase, then merged into the one added before it. Returns the lightest
/// phase cut and the cities on its last-vertex side.
fn stoer_wagner(mut weights: Vec<Vec<f64>>) -> (f64, Vec<usize>) {
    let n = weights.len();
    let mut groups: Vec<Vec<usize>> = (0..n).map(|v| vec![v]).collect();
    let mut active: Vec<usize> = (0..n).collect();
    let mut best = (f64::INFINITY, Vec::new());

    while active.len() > 1 {
        let mut attached = vec![0.0; n];
        let mut in_order = vec![false; n];
        let mut previous = active[0];
        let mut last = active[0];
        in_order[last] = true;
        for &v in &active {
            attached[v] = weights[last][v];
        }

        for _ in 1..active.len() {
            let next = active
                .iter()
                .copied()
                .filter(|&v| !in_order[v])
                .fold(None, |pick: Option<usize>, v| match pick {
                    Some(u) if attached[u] >= attached[v] => Some(u),
                    _ => Some(v),
                });
            let Some(next) = next else { break };
            in_order[next] = true;
            previous = last;
            last = next;
            for &v in &active {
                if !in_order[v] {
                    attached[v] += weights[next][v];
                }
            }
        }

        if attached[last] < best.0 {
            best = (attached[last], groups[last].clone());
        }

        let absorbed = std::mem::take(&mut groups[last]);
        groups[previous].extend(absorbed);
        for v in 0..n {
            let w = weights[last][v];
            weights[previous][v] += w;
            weights[v][previous] = weights[previous][v];
        }
        weights[previous][previous] = 0.0;
        active.retain(|&v| v != last);
    }

    best
}
