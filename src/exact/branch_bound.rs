//! Branch-and-cut search over the assignment relaxation.
//!
//! The search tree lives in an arena (`Vec<SearchNode>`) with parent/child
//! links; the frontier is a best-bound-first heap with FIFO tie-breaking.
//! A node is relaxed when it is created, so its bound is known before it
//! enters the frontier. Expanding a node means:
//!
//! 1. prune if its bound cannot beat the incumbent;
//! 2. accept it as a tour if the relaxation is one Hamiltonian cycle;
//! 3. otherwise add violated subtour cuts and re-relax in place, for at most
//!    `max_cut_rounds` rounds;
//! 4. otherwise branch on one edge: a forced-in child and a forced-out child.
//!
//! The deadline is checked before every relaxation an expansion would start.
//! An expansion cut short goes back to the frontier with the bound and point
//! it had reached, so the reported lower bound stays valid.
//!
//! Everything a worker touches while expanding lives in [`SearchContext`]:
//! the matrix, the append-only cut pool and the incumbent. With more than one
//! thread, batches of frontier nodes are expanded concurrently with rayon and
//! their outcomes are merged back in pop order.

use crate::error::{Result, SolverError};
use crate::exact::cuts::{CutPool, CuttingPlaneGenerator, SubtourCut};
use crate::exact::driver::SolverConfig;
use crate::exact::relaxation::{Edge, EdgeFixings, EdgeValues, Relaxation, RelaxationSolver};
use crate::exact::subtour::SubtourDetector;
use crate::exact::tour::TourAssembler;
use crate::instance::DistanceMatrix;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

pub type NodeId = usize;

/// Relative slack used when comparing a bound against the incumbent
const PRUNE_TOLERANCE: f64 = 1e-9;

/// Lifecycle of a search node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Created, relaxation not solved yet
    Pending,
    /// Bound known, waiting in the frontier
    Relaxed,
    /// No completion satisfies the fixings and cuts
    Infeasible,
    /// Relaxation was a full tour
    Integral,
    /// Needed branching; its children are recorded on the node
    Fractional,
    /// Bound cannot beat the incumbent
    Pruned,
}

/// The decision that created a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branching {
    ForceIn(Edge),
    ForceOut(Edge),
}

impl Branching {
    pub fn apply(&self, fixings: &EdgeFixings) -> EdgeFixings {
        match *self {
            Branching::ForceIn(edge) => fixings.with_forced_in(edge),
            Branching::ForceOut(edge) => fixings.with_forced_out(edge),
        }
    }
}

impl std::fmt::Display for Branching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branching::ForceIn((i, j)) => write!(f, "+({}, {})", i, j),
            Branching::ForceOut((i, j)) => write!(f, "-({}, {})", i, j),
        }
    }
}

/// Arena entry of the search tree
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub decision: Option<Branching>,
    pub fixings: EdgeFixings,
    pub bound: f64,
    pub state: NodeState,
}

/// Best complete tour found so far
#[derive(Debug, Clone, PartialEq)]
pub struct Incumbent {
    pub tour: Vec<usize>,
    pub cost: f64,
    /// Node that produced it; `None` for a warm start
    pub node: Option<NodeId>,
}

/// Counters collected during one search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub nodes_created: usize,
    pub nodes_expanded: usize,
    pub nodes_pruned: usize,
    pub nodes_infeasible: usize,
    pub integral_nodes: usize,
    pub incumbent_updates: usize,
    pub relaxations: usize,
    pub cut_rounds: usize,
    pub cuts_in_pool: usize,
    pub max_depth: usize,
}

/// Why the search loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Frontier empty: the incumbent is optimal
    Exhausted,
    TimeLimit,
    NodeLimit,
}

#[derive(Debug, Clone)]
pub struct SearchSummary {
    pub termination: Termination,
    /// `min(best frontier bound, incumbent cost)`; `None` when nothing was solved
    pub lower_bound: Option<f64>,
    pub root_bound: Option<f64>,
    pub incumbent: Option<Incumbent>,
    pub stats: SearchStats,
}

/// State shared by every worker of one solve
pub struct SearchContext<'a> {
    pub matrix: &'a DistanceMatrix,
    pub config: &'a SolverConfig,
    generator: CuttingPlaneGenerator,
    cuts: RwLock<CutPool>,
    incumbent: Mutex<Option<Incumbent>>,
}

impl<'a> SearchContext<'a> {
    pub fn new(matrix: &'a DistanceMatrix, config: &'a SolverConfig) -> Self {
        let mut generator = CuttingPlaneGenerator::new();
        generator.min_cut_separation = config.min_cut_separation;
        SearchContext {
            matrix,
            config,
            generator,
            cuts: RwLock::new(CutPool::new()),
            incumbent: Mutex::new(None),
        }
    }

    fn pool(&self) -> RwLockReadGuard<'_, CutPool> {
        self.cuts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn pool_mut(&self) -> RwLockWriteGuard<'_, CutPool> {
        self.cuts.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn best(&self) -> MutexGuard<'_, Option<Incumbent>> {
        self.incumbent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cut_count(&self) -> usize {
        self.pool().len()
    }

    pub fn cut_snapshot(&self) -> Vec<Arc<SubtourCut>> {
        self.pool().snapshot()
    }

    /// Separate cuts violated by `values` and append the new ones
    pub fn add_cuts(&self, values: &EdgeValues) -> usize {
        let candidates = self.generator.separate(values);
        if candidates.is_empty() {
            return 0;
        }
        let mut pool = self.pool_mut();
        candidates
            .into_iter()
            .filter_map(|cut| pool.insert(cut))
            .count()
    }

    pub fn incumbent_cost(&self) -> f64 {
        self.best().as_ref().map_or(f64::INFINITY, |inc| inc.cost)
    }

    pub fn incumbent(&self) -> Option<Incumbent> {
        self.best().clone()
    }

    /// Install `tour` if it is strictly cheaper than the current incumbent.
    /// The comparison and the swap happen under one lock.
    pub fn offer_incumbent(&self, tour: Vec<usize>, cost: f64, node: Option<NodeId>) -> bool {
        let mut best = self.best();
        let improves = match best.as_ref() {
            None => true,
            Some(current) => cost < current.cost - PRUNE_TOLERANCE * current.cost.abs().max(1.0),
        };
        if improves {
            *best = Some(Incumbent { tour, cost, node });
        }
        improves
    }

    /// True when a node with this bound cannot produce a strictly better tour
    pub fn can_prune(&self, bound: f64) -> bool {
        let incumbent = self.incumbent_cost();
        incumbent.is_finite() && bound >= incumbent - PRUNE_TOLERANCE * incumbent.abs().max(1.0)
    }

    fn relax(&self, fixings: &EdgeFixings) -> Result<(Relaxation, usize)> {
        let cuts = self.cut_snapshot();
        let solver = RelaxationSolver::new(self.matrix);
        let relaxation = solver.solve(fixings, &cuts)?;
        Ok((relaxation, cuts.len()))
    }
}

/// Frontier entry: a relaxed node and the point its bound came from
struct FrontierEntry {
    key: Reverse<(OrderedFloat<f64>, u64)>,
    node: NodeId,
    values: EdgeValues,
    pool_len: usize,
}

impl FrontierEntry {
    fn bound(&self) -> f64 {
        (self.key.0).0.into_inner()
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Work item handed to a worker; owns everything it reads from the node
struct Job {
    node: NodeId,
    depth: usize,
    fixings: EdgeFixings,
    values: EdgeValues,
    bound: f64,
    pool_len: usize,
}

struct ChildRelaxation {
    decision: Branching,
    fixings: EdgeFixings,
    relaxation: Relaxation,
    pool_len: usize,
}

enum Expansion {
    Pruned { bound: f64 },
    Infeasible,
    Integral { bound: f64, cost: f64, improved: bool },
    Branched { bound: f64, edge: Edge, children: Vec<ChildRelaxation> },
    /// Deadline passed before the next relaxation
    Interrupted { bound: f64, values: EdgeValues, pool_len: usize },
}

struct ExpansionReport {
    outcome: Expansion,
    relaxations: usize,
    cut_rounds: usize,
}

fn diagnostic(node: NodeId, depth: usize, fixings: &EdgeFixings) -> String {
    format!("node {} at depth {}, fixings {}", node, depth, fixings)
}

fn expand(ctx: &SearchContext<'_>, job: Job, deadline: Instant) -> Result<ExpansionReport> {
    let Job {
        node,
        depth,
        fixings,
        mut values,
        mut bound,
        mut pool_len,
    } = job;
    let tolerance = ctx.config.integrality_tolerance;
    let detector = SubtourDetector::integral();
    let mut relaxations = 0;
    let mut cut_rounds = 0;

    let report = |outcome, relaxations, cut_rounds| ExpansionReport {
        outcome,
        relaxations,
        cut_rounds,
    };
    let expired = || Instant::now() >= deadline;
    let interrupted = |bound, values, pool_len| Expansion::Interrupted {
        bound,
        values,
        pool_len,
    };

    if expired() {
        return Ok(report(interrupted(bound, values, pool_len), relaxations, cut_rounds));
    }

    // Cuts appended since this node was relaxed are applied first.
    if ctx.cut_count() > pool_len {
        relaxations += 1;
        match ctx.relax(&fixings)? {
            (Relaxation::Infeasible, _) => {
                return Ok(report(Expansion::Infeasible, relaxations, cut_rounds))
            }
            (Relaxation::Solved { values: v, objective }, len) => {
                values = v;
                bound = bound.max(objective);
                pool_len = len;
            }
        }
    }

    loop {
        if ctx.can_prune(bound) {
            return Ok(report(Expansion::Pruned { bound }, relaxations, cut_rounds));
        }

        if detector.is_full_tour(&values, tolerance) {
            let tour = TourAssembler::assemble(&values, &diagnostic(node, depth, &fixings))?;
            let cost = ctx.matrix.tour_cost(&tour);
            let improved = ctx.offer_incumbent(tour, cost, Some(node));
            return Ok(report(
                Expansion::Integral {
                    bound,
                    cost,
                    improved,
                },
                relaxations,
                cut_rounds,
            ));
        }

        if cut_rounds >= ctx.config.max_cut_rounds {
            break;
        }
        ctx.add_cuts(&values);
        if ctx.cut_count() == pool_len {
            break;
        }
        if expired() {
            return Ok(report(interrupted(bound, values, pool_len), relaxations, cut_rounds));
        }

        cut_rounds += 1;
        relaxations += 1;
        match ctx.relax(&fixings)? {
            (Relaxation::Infeasible, _) => {
                return Ok(report(Expansion::Infeasible, relaxations, cut_rounds))
            }
            (Relaxation::Solved { values: v, objective }, len) => {
                log::trace!(
                    "node {} round {}: bound {:.6} -> {:.6} ({} cuts)",
                    node,
                    cut_rounds,
                    bound,
                    objective,
                    len
                );
                values = v;
                bound = bound.max(objective);
                pool_len = len;
            }
        }
    }

    let edge = select_branching_edge(&values, &fixings, tolerance).ok_or_else(|| {
        SolverError::numerical(format!(
            "no branching candidate on a non-tour point ({})",
            diagnostic(node, depth, &fixings)
        ))
    })?;

    if expired() {
        return Ok(report(interrupted(bound, values, pool_len), relaxations, cut_rounds));
    }

    let mut children = Vec::with_capacity(2);
    for decision in [Branching::ForceIn(edge), Branching::ForceOut(edge)] {
        let child_fixings = decision.apply(&fixings);
        let (relaxation, len) = ctx.relax(&child_fixings)?;
        relaxations += 1;
        children.push(ChildRelaxation {
            decision,
            fixings: child_fixings,
            relaxation,
            pool_len: len,
        });
    }

    Ok(report(
        Expansion::Branched {
            bound,
            edge,
            children,
        },
        relaxations,
        cut_rounds,
    ))
}

/// Fractional edge with value closest to 0.5, lowest `(i, j)` on ties.
///
/// An integral point that still has subtours (cut rounds exhausted) branches
/// on the lowest edge of its smallest subtour that is not already forced in.
pub fn select_branching_edge(values: &EdgeValues, fixings: &EdgeFixings, tolerance: f64) -> Option<Edge> {
    let mut best: Option<(Edge, f64)> = None;
    for (edge, v) in values.support(tolerance) {
        if v >= 1.0 - tolerance {
            continue;
        }
        let score = (v - 0.5).abs();
        if best.map_or(true, |(_, s)| score < s - 1e-12) {
            best = Some((edge, score));
        }
    }
    if let Some((edge, _)) = best {
        return Some(edge);
    }

    let subtours = SubtourDetector::integral().subtours(values);
    let smallest = subtours.iter().min_by_key(|c| c.len())?;
    values
        .support(0.5)
        .map(|(edge, _)| edge)
        .find(|&(i, j)| {
            smallest.binary_search(&i).is_ok()
                && smallest.binary_search(&j).is_ok()
                && !fixings.is_forced_in((i, j))
        })
}

/// Branch-and-bound driver loop
pub struct BranchAndBound<'a> {
    ctx: SearchContext<'a>,
    nodes: Vec<SearchNode>,
    frontier: BinaryHeap<FrontierEntry>,
    next_seq: u64,
    stats: SearchStats,
    root_bound: Option<f64>,
}

impl<'a> BranchAndBound<'a> {
    pub fn new(matrix: &'a DistanceMatrix, config: &'a SolverConfig) -> Self {
        BranchAndBound {
            ctx: SearchContext::new(matrix, config),
            nodes: Vec::new(),
            frontier: BinaryHeap::new(),
            next_seq: 0,
            stats: SearchStats::default(),
            root_bound: None,
        }
    }

    pub fn context(&self) -> &SearchContext<'a> {
        &self.ctx
    }

    pub fn nodes(&self) -> &[SearchNode] {
        &self.nodes
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Offer a heuristic tour as the starting incumbent
    pub fn seed_incumbent(&mut self, tour: Vec<usize>) -> bool {
        let cost = self.ctx.matrix.tour_cost(&tour);
        let accepted = self.ctx.offer_incumbent(tour, cost, None);
        if accepted {
            self.stats.incumbent_updates += 1;
            log::debug!("warm start incumbent {:.4}", cost);
        }
        accepted
    }

    /// Create and relax the root node. Returns its bound, `None` if infeasible.
    pub fn relax_root(&mut self) -> Result<Option<f64>> {
        let (relaxation, pool_len) = self.ctx.relax(&EdgeFixings::new())?;
        self.stats.relaxations += 1;
        self.stats.nodes_created += 1;

        let mut root = SearchNode {
            id: 0,
            parent: None,
            children: Vec::new(),
            depth: 0,
            decision: None,
            fixings: EdgeFixings::new(),
            bound: 0.0,
            state: NodeState::Pending,
        };

        match relaxation {
            Relaxation::Infeasible => {
                root.state = NodeState::Infeasible;
                self.stats.nodes_infeasible += 1;
                self.nodes.push(root);
                Ok(None)
            }
            Relaxation::Solved { values, objective } => {
                root.bound = objective;
                root.state = NodeState::Relaxed;
                self.nodes.push(root);
                self.root_bound = Some(objective);
                self.push_frontier(0, objective, values, pool_len);
                log::info!("root relaxation bound {:.4}", objective);
                Ok(Some(objective))
            }
        }
    }

    fn push_frontier(&mut self, node: NodeId, bound: f64, values: EdgeValues, pool_len: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frontier.push(FrontierEntry {
            key: Reverse((OrderedFloat(bound), seq)),
            node,
            values,
            pool_len,
        });
    }

    /// Lowest bound still waiting in the frontier
    pub fn best_frontier_bound(&self) -> Option<f64> {
        self.frontier.peek().map(|entry| entry.bound())
    }

    /// Current global lower bound
    pub fn lower_bound(&self) -> Option<f64> {
        let incumbent = self.ctx.incumbent_cost();
        match self.best_frontier_bound() {
            Some(bound) => Some(bound.min(incumbent)),
            None if incumbent.is_finite() => Some(incumbent),
            None => None,
        }
    }

    /// Expand nodes until the frontier is empty, `deadline` passes, or the
    /// node limit is reached. Past the deadline no new relaxation is started.
    pub fn run(&mut self, deadline: Instant) -> Result<SearchSummary> {
        let config = self.ctx.config;
        let batch_size = config.threads.max(1);

        let termination = loop {
            if self.frontier.is_empty() {
                break Termination::Exhausted;
            }
            if Instant::now() >= deadline {
                break Termination::TimeLimit;
            }
            if config
                .node_limit
                .map_or(false, |limit| self.stats.nodes_expanded >= limit)
            {
                break Termination::NodeLimit;
            }

            let mut jobs = Vec::with_capacity(batch_size);
            while jobs.len() < batch_size {
                let entry = match self.frontier.pop() {
                    Some(entry) => entry,
                    None => break,
                };
                let bound = entry.bound();
                if self.ctx.can_prune(bound) {
                    self.nodes[entry.node].state = NodeState::Pruned;
                    self.stats.nodes_pruned += 1;
                    continue;
                }
                let node = &self.nodes[entry.node];
                jobs.push(Job {
                    node: entry.node,
                    depth: node.depth,
                    fixings: node.fixings.clone(),
                    values: entry.values,
                    bound,
                    pool_len: entry.pool_len,
                });
            }

            if jobs.is_empty() {
                continue;
            }

            let ids: Vec<NodeId> = jobs.iter().map(|job| job.node).collect();
            let ctx = &self.ctx;
            let reports: Vec<Result<ExpansionReport>> = if jobs.len() == 1 {
                jobs.into_iter().map(|job| expand(ctx, job, deadline)).collect()
            } else {
                jobs.into_par_iter().map(|job| expand(ctx, job, deadline)).collect()
            };

            for (id, report) in ids.into_iter().zip(reports) {
                self.absorb(id, report?);
            }
        };

        self.stats.cuts_in_pool = self.ctx.cut_count();
        let summary = SearchSummary {
            termination,
            lower_bound: self.lower_bound(),
            root_bound: self.root_bound,
            incumbent: self.ctx.incumbent(),
            stats: self.stats.clone(),
        };
        log::info!(
            "search stopped ({:?}) after {} nodes, {} cuts",
            termination,
            self.stats.nodes_expanded,
            self.stats.cuts_in_pool
        );
        Ok(summary)
    }

    fn absorb(&mut self, id: NodeId, report: ExpansionReport) {
        self.stats.relaxations += report.relaxations;
        self.stats.cut_rounds += report.cut_rounds;

        let outcome = match report.outcome {
            Expansion::Interrupted {
                bound,
                values,
                pool_len,
            } => {
                self.nodes[id].bound = bound;
                self.nodes[id].state = NodeState::Relaxed;
                self.push_frontier(id, bound, values, pool_len);
                log::trace!("node {} returned to the frontier at the deadline", id);
                return;
            }
            outcome => outcome,
        };
        self.stats.nodes_expanded += 1;

        match outcome {
            Expansion::Pruned { bound } => {
                self.nodes[id].bound = bound;
                self.nodes[id].state = NodeState::Pruned;
                self.stats.nodes_pruned += 1;
            }
            Expansion::Infeasible => {
                self.nodes[id].state = NodeState::Infeasible;
                self.stats.nodes_infeasible += 1;
                log::trace!("node {} infeasible after cuts", id);
            }
            Expansion::Integral {
                bound,
                cost,
                improved,
            } => {
                let node = &mut self.nodes[id];
                node.bound = bound;
                node.state = NodeState::Integral;
                self.stats.integral_nodes += 1;
                if improved {
                    self.stats.incumbent_updates += 1;
                    log::debug!(
                        "new incumbent {:.4} at node {} (depth {})",
                        cost,
                        id,
                        node.depth
                    );
                }
            }
            Expansion::Branched {
                bound,
                edge,
                children,
            } => {
                self.nodes[id].bound = bound;
                self.nodes[id].state = NodeState::Fractional;
                log::trace!("node {} branches on {:?} (bound {:.4})", id, edge, bound);
                for child in children {
                    self.add_child(id, child);
                }
            }
            Expansion::Interrupted { .. } => {}
        }

        let interval = self.ctx.config.log_interval;
        if interval > 0 && self.stats.nodes_expanded % interval == 0 {
            log::info!(
                "nodes {} | frontier {} | bound {} | incumbent {} | cuts {}",
                self.stats.nodes_expanded,
                self.frontier.len(),
                self.lower_bound()
                    .map_or("-".to_string(), |b| format!("{:.4}", b)),
                Some(self.ctx.incumbent_cost())
                    .filter(|c| c.is_finite())
                    .map_or("-".to_string(), |c| format!("{:.4}", c)),
                self.ctx.cut_count()
            );
        }
    }

    fn add_child(&mut self, parent: NodeId, child: ChildRelaxation) {
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        let parent_bound = self.nodes[parent].bound;

        let mut node = SearchNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            depth,
            decision: Some(child.decision),
            fixings: child.fixings,
            bound: parent_bound,
            state: NodeState::Pending,
        };
        self.stats.nodes_created += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        match child.relaxation {
            Relaxation::Infeasible => {
                node.state = NodeState::Infeasible;
                self.stats.nodes_infeasible += 1;
                self.nodes.push(node);
            }
            Relaxation::Solved { values, objective } => {
                // A child never bounds below its parent.
                let bound = objective.max(parent_bound);
                node.bound = bound;
                if self.ctx.can_prune(bound) {
                    node.state = NodeState::Pruned;
                    self.stats.nodes_pruned += 1;
                    self.nodes.push(node);
                } else {
                    node.state = NodeState::Relaxed;
                    self.nodes.push(node);
                    self.push_frontier(id, bound, values, child.pool_len);
                }
            }
        }

        self.nodes[parent].children.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> SolverConfig {
        SolverConfig {
            log_interval: 0,
            ..Default::default()
        }
    }

    fn clusters() -> DistanceMatrix {
        DistanceMatrix::new(vec![
            vec![0.0, 1.0, 100.0, 100.0],
            vec![1.0, 0.0, 100.0, 100.0],
            vec![100.0, 100.0, 0.0, 1.0],
            vec![100.0, 100.0, 1.0, 0.0],
        ])
        .unwrap()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    fn pop_job(engine: &mut BranchAndBound<'_>) -> Job {
        let entry = engine.frontier.pop().unwrap();
        let node = &engine.nodes[entry.node];
        Job {
            node: entry.node,
            depth: node.depth,
            fixings: node.fixings.clone(),
            bound: entry.bound(),
            pool_len: entry.pool_len,
            values: entry.values,
        }
    }

    #[test]
    fn test_incumbent_only_improves_strictly() {
        let matrix = clusters();
        let config = config();
        let ctx = SearchContext::new(&matrix, &config);
        assert!(ctx.offer_incumbent(vec![0, 1, 2, 3], 202.0, Some(1)));
        assert!(!ctx.offer_incumbent(vec![0, 3, 2, 1], 202.0, Some(2)));
        assert_eq!(ctx.incumbent().unwrap().node, Some(1));
        assert!(!ctx.offer_incumbent(vec![0, 2, 1, 3], 400.0, Some(3)));
        assert!(ctx.can_prune(202.0));
        assert!(!ctx.can_prune(201.0));
    }

    #[test]
    fn test_branching_prefers_half_values() {
        let mut values = EdgeValues::zeros(3);
        values.set(0, 1, 0.3);
        values.set(1, 2, 0.5);
        values.set(2, 0, 0.5);
        let edge = select_branching_edge(&values, &EdgeFixings::new(), 1e-6);
        assert_eq!(edge, Some((1, 2)));
    }

    #[test]
    fn test_branching_on_integral_subtour_skips_forced_edges() {
        let mut values = EdgeValues::zeros(5);
        for (i, j) in [(0, 1), (1, 0), (2, 3), (3, 4), (4, 2)] {
            values.set(i, j, 1.0);
        }
        let fixings = EdgeFixings::new().with_forced_in((0, 1));
        assert_eq!(select_branching_edge(&values, &fixings, 1e-6), Some((1, 0)));
        assert_eq!(
            select_branching_edge(&values, &EdgeFixings::new(), 1e-6),
            Some((0, 1))
        );
    }

    #[test]
    fn test_frontier_is_best_bound_then_fifo() {
        let matrix = clusters();
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        let values = EdgeValues::zeros(4);
        engine.push_frontier(0, 5.0, values.clone(), 0);
        engine.push_frontier(1, 3.0, values.clone(), 0);
        engine.push_frontier(2, 3.0, values.clone(), 0);
        engine.push_frontier(3, 4.0, values, 0);

        let order: Vec<NodeId> = std::iter::from_fn(|| engine.frontier.pop().map(|e| e.node)).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_search_solves_cluster_instance() {
        let matrix = clusters();
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        let root = engine.relax_root().unwrap().unwrap();
        assert!((root - 4.0).abs() < 1e-9);

        let summary = engine.run(far_deadline()).unwrap();
        assert_eq!(summary.termination, Termination::Exhausted);
        let incumbent = summary.incumbent.unwrap();
        assert!((incumbent.cost - 202.0).abs() < 1e-9);
        assert_eq!(summary.lower_bound, Some(incumbent.cost));
        assert!(summary.stats.cuts_in_pool >= 2);
        for cut in engine.context().cut_snapshot() {
            assert!(cut.admits_tour(&incumbent.tour));
        }

        // every non-root node points back at a parent that lists it
        for node in engine.nodes().iter().skip(1) {
            let parent = node.parent.unwrap();
            assert!(engine.nodes()[parent].children.contains(&node.id));
            assert_eq!(node.depth, engine.nodes()[parent].depth + 1);
        }
    }

    #[test]
    fn test_cuts_never_exclude_the_optimal_tour() {
        let matrix = DistanceMatrix::random_euclidean(10, 23);
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let summary = engine.run(far_deadline()).unwrap();
        let best = summary.incumbent.unwrap();
        let cuts = engine.context().cut_snapshot();
        assert!(!cuts.is_empty());
        assert!(cuts.iter().all(|cut| cut.admits_tour(&best.tour)));
        assert!(summary.root_bound.unwrap() <= best.cost + 1e-6);
    }

    #[test]
    fn test_expired_deadline_keeps_root_bound() {
        let matrix = clusters();
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let summary = engine.run(Instant::now()).unwrap();
        assert_eq!(summary.termination, Termination::TimeLimit);
        assert!(summary.incumbent.is_none());
        assert!((summary.lower_bound.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(summary.stats.nodes_expanded, 0);
    }

    #[test]
    fn test_pure_branching_without_cuts_still_terminates() {
        let matrix = DistanceMatrix::random_euclidean(6, 11);
        let config = SolverConfig {
            max_cut_rounds: 0,
            log_interval: 0,
            ..Default::default()
        };
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let summary = engine.run(far_deadline()).unwrap();
        assert_eq!(summary.termination, Termination::Exhausted);
        assert_eq!(summary.stats.cuts_in_pool, 0);
        let incumbent = summary.incumbent.unwrap();
        assert_eq!(incumbent.tour.len(), 6);
    }

    #[test]
    fn test_node_limit_stops_search() {
        let matrix = DistanceMatrix::random_euclidean(9, 5);
        let config = SolverConfig {
            node_limit: Some(1),
            max_cut_rounds: 0,
            log_interval: 0,
            ..Default::default()
        };
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let summary = engine.run(far_deadline()).unwrap();
        assert!(summary.stats.nodes_expanded <= 1);
        if summary.termination == Termination::NodeLimit {
            assert!(summary.lower_bound.unwrap() >= summary.root_bound.unwrap() - 1e-9);
        }
    }

    #[test]
    fn test_expansion_past_deadline_starts_no_relaxation() {
        let matrix = clusters();
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let job = pop_job(&mut engine);

        let report = expand(engine.context(), job, Instant::now()).unwrap();
        assert_eq!(report.relaxations, 0);
        assert_eq!(report.cut_rounds, 0);
        assert!(matches!(report.outcome, Expansion::Interrupted { .. }));

        engine.absorb(0, report);
        assert_eq!(engine.stats().nodes_expanded, 0);
        assert_eq!(engine.nodes()[0].state, NodeState::Relaxed);
        assert!((engine.lower_bound().unwrap() - 4.0).abs() < 1e-9);

        // the node picks up where it stopped once time is available again
        let summary = engine.run(far_deadline()).unwrap();
        assert_eq!(summary.termination, Termination::Exhausted);
        assert!((summary.incumbent.unwrap().cost - 202.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_node_is_not_re_relaxed_after_deadline() {
        let matrix = clusters();
        let config = config();
        let mut engine = BranchAndBound::new(&matrix, &config);
        engine.relax_root().unwrap();
        let job = pop_job(&mut engine);
        assert_eq!(engine.context().add_cuts(&job.values), 2);

        let report = expand(engine.context(), job, Instant::now()).unwrap();
        assert_eq!(report.relaxations, 0);
        match &report.outcome {
            Expansion::Interrupted { bound, pool_len, .. } => {
                assert!((bound - 4.0).abs() < 1e-9);
                assert_eq!(*pool_len, 0);
            }
            _ => panic!("expansion should stop at the deadline"),
        }

        engine.absorb(0, report);
        let summary = engine.run(Instant::now()).unwrap();
        assert_eq!(summary.termination, Termination::TimeLimit);
        assert_eq!(summary.stats.relaxations, 1);
        assert!((summary.lower_bound.unwrap() - 4.0).abs() < 1e-9);
    }
}
