//! Benchmarking and result logging.
//!
//! Provides batch solving over a directory of instances, summary statistics,
//! CSV export, and the append-only tab-separated results log written by
//! every `solve`.

use crate::error::Result;
use crate::exact::driver::{SolverConfig, TspSolver};
use crate::heuristics;
use crate::instance::DistanceMatrix;
use crate::solution::{relative_gap, SolveOutcome};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Default results log file name
pub const DEFAULT_RESULTS_LOG: &str = "bks.out";

/// Result of solving one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Instance name
    pub instance: String,
    /// Instance dimension
    pub dimension: usize,
    /// Tour cost, empty when no tour was found
    pub cost: Option<f64>,
    /// Best proven lower bound
    pub lower_bound: f64,
    /// Relative gap in percent
    pub gap: Option<f64>,
    /// Whether optimality was proven
    pub optimal: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Nodes expanded by the search
    pub nodes: usize,
    /// Subtour cuts in the pool at the end
    pub cuts: usize,
    /// Warm start heuristic cost (if computed)
    pub heuristic_cost: Option<f64>,
    /// Heuristic gap to the exact cost in percent
    pub heuristic_gap: Option<f64>,
}

/// Aggregated statistics over a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub num_instances: usize,
    /// Instances with a tour
    pub num_solved: usize,
    /// Instances proven optimal
    pub num_optimal: usize,
    pub avg_time: f64,
    pub total_time: f64,
    /// Average gap over solved instances, in percent
    pub avg_gap: Option<f64>,
    pub avg_nodes: f64,
    /// Average heuristic gap, in percent
    pub avg_heuristic_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Configuration passed to every solve
    pub solver: SolverConfig,
    /// Skip instances above this size
    pub max_size: Option<usize>,
    /// Also run the warm start heuristic alone for comparison
    pub compare_heuristic: bool,
    /// Show a progress bar
    pub progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            solver: SolverConfig::default(),
            max_size: None,
            compare_heuristic: true,
            progress: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<BenchmarkRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Solve one instance and record the result
    pub fn run_instance(&mut self, matrix: &DistanceMatrix) -> Result<&BenchmarkRecord> {
        log::info!("Running benchmark on instance: {}", matrix.name);

        let outcome = TspSolver::new(self.config.solver.clone()).solve(matrix)?;
        let heuristic_cost = if self.config.compare_heuristic {
            heuristics::warm_start(matrix).map(|s| s.cost)
        } else {
            None
        };

        let record = match &outcome {
            SolveOutcome::Solved(result) => BenchmarkRecord {
                instance: result.instance.clone(),
                dimension: result.dimension,
                cost: Some(result.total_cost),
                lower_bound: result.lower_bound,
                gap: Some(result.gap * 100.0),
                optimal: result.proven_optimal,
                time: result.elapsed,
                nodes: result.stats.nodes_expanded,
                cuts: result.stats.cuts_in_pool,
                heuristic_cost,
                heuristic_gap: heuristic_cost.map(|h| relative_gap(h, result.total_cost) * 100.0),
            },
            SolveOutcome::NoFeasibleSolution {
                lower_bound,
                elapsed,
                reason,
            } => {
                log::warn!("{}: {}", matrix.name, reason);
                BenchmarkRecord {
                    instance: matrix.name.clone(),
                    dimension: matrix.dimension(),
                    cost: None,
                    lower_bound: *lower_bound,
                    gap: None,
                    optimal: false,
                    time: *elapsed,
                    nodes: 0,
                    cuts: 0,
                    heuristic_cost,
                    heuristic_gap: None,
                }
            }
        };

        self.results.push(record);
        Ok(&self.results[self.results.len() - 1])
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[DistanceMatrix]) -> Result<()> {
        let pb = if self.config.progress {
            create_progress_bar(instances.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        for matrix in instances {
            if self.config.max_size.map_or(false, |max| matrix.dimension() > max) {
                log::info!("Skipping {} ({} cities)", matrix.name, matrix.dimension());
                pb.inc(1);
                continue;
            }
            pb.set_message(matrix.name.clone());
            self.run_instance(matrix)?;
            pb.inc(1);
        }

        pb.finish_with_message("done");
        Ok(())
    }

    /// Compute statistics over all results
    pub fn compute_statistics(&self) -> BenchmarkStatistics {
        let num_instances = self.results.len();
        let solved: Vec<&BenchmarkRecord> = self.results.iter().filter(|r| r.cost.is_some()).collect();
        let total_time: f64 = self.results.iter().map(|r| r.time).sum();

        let mean = |values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        BenchmarkStatistics {
            num_instances,
            num_solved: solved.len(),
            num_optimal: self.results.iter().filter(|r| r.optimal).count(),
            avg_time: if num_instances > 0 {
                total_time / num_instances as f64
            } else {
                0.0
            },
            total_time,
            avg_gap: mean(solved.iter().filter_map(|r| r.gap).collect()),
            avg_nodes: mean(self.results.iter().map(|r| r.nodes as f64).collect()).unwrap_or(0.0),
            avg_heuristic_gap: mean(solved.iter().filter_map(|r| r.heuristic_gap).collect()),
        }
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       TSP Branch-and-Cut Report\n");
        report.push_str("========================================\n\n");

        let stats = self.compute_statistics();
        report.push_str(&format!(
            "Instances: {} ({} solved, {} optimal)\n",
            stats.num_instances, stats.num_solved, stats.num_optimal
        ));
        report.push_str(&format!(
            "Time: {:.3}s total, {:.3}s average\n",
            stats.total_time, stats.avg_time
        ));
        report.push_str(&format!("Average nodes: {:.1}\n", stats.avg_nodes));
        if let Some(gap) = stats.avg_gap {
            report.push_str(&format!("Average gap: {:.4}%\n", gap));
        }
        if let Some(gap) = stats.avg_heuristic_gap {
            report.push_str(&format!("Average heuristic gap: {:.2}%\n", gap));
        }
        report.push('\n');

        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<25} {:>6} {:>12} {:>12} {:>9} {:>8} {:>6} {:>10}\n",
            "Instance", "N", "Cost", "Bound", "Gap%", "Nodes", "Cuts", "Time"
        ));
        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        for r in &self.results {
            let cost = r.cost.map_or_else(|| "-".to_string(), |c| format!("{:.2}", c));
            let gap = r.gap.map_or_else(|| "-".to_string(), |g| format!("{:.4}", g));
            report.push_str(&format!(
                "{:<25} {:>6} {:>12} {:>12.2} {:>9} {:>8} {:>6} {:>10.3}\n",
                r.instance, r.dimension, cost, r.lower_bound, gap, r.nodes, r.cuts, r.time
            ));
        }

        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        report
    }

    /// Get all results
    pub fn results(&self) -> &[BenchmarkRecord] {
        &self.results
    }
}

/// Progress bar for batch runs
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Load every `.tsp` and `.csv` instance in a directory, sorted by size.
/// Files that fail to parse are skipped with a warning.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<DistanceMatrix>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("tsp") || e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut instances = Vec::new();
    for path in paths {
        match DistanceMatrix::from_file(&path) {
            Ok(matrix) => instances.push(matrix),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    instances.sort_by_key(|m| m.dimension());
    Ok(instances)
}

/// Append-only tab-separated log, one record per solve:
/// `source  total_cost  elapsed_seconds  tour  timestamp  lower_bound  optimal`
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ResultLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, source: &str, outcome: &SolveOutcome) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);

        let timestamp = chrono::Local::now().to_rfc3339();
        let record = match outcome {
            SolveOutcome::Solved(result) => vec![
                source.to_string(),
                result.total_cost.to_string(),
                result.elapsed.to_string(),
                format!("{:?}", result.tour),
                timestamp,
                result.lower_bound.to_string(),
                result.proven_optimal.to_string(),
            ],
            SolveOutcome::NoFeasibleSolution {
                lower_bound,
                elapsed,
                ..
            } => vec![
                source.to_string(),
                String::new(),
                elapsed.to_string(),
                "[]".to_string(),
                timestamp,
                lower_bound.to_string(),
                "false".to_string(),
            ],
        };

        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn quick_config() -> BenchmarkConfig {
        BenchmarkConfig {
            solver: SolverConfig {
                log_interval: 0,
                ..Default::default()
            },
            progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert!(config.compare_heuristic);
        assert_eq!(config.solver.threads, 1);
    }

    #[test]
    fn test_run_and_export() {
        let instances = vec![
            DistanceMatrix::random_euclidean(6, 1),
            DistanceMatrix::random_euclidean(5, 2),
            DistanceMatrix::random_euclidean(12, 3),
        ];
        let mut bench = Benchmark::new(BenchmarkConfig {
            max_size: Some(8),
            ..quick_config()
        });
        bench.run_on_instances(&instances).unwrap();

        assert_eq!(bench.results().len(), 2);
        let stats = bench.compute_statistics();
        assert_eq!(stats.num_optimal, 2);
        for r in bench.results() {
            assert!(r.heuristic_cost.unwrap() >= r.cost.unwrap() - 1e-6);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        bench.export_to_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("instance,dimension,cost"));
        assert_eq!(content.lines().count(), 3);
        assert!(bench.generate_report().contains("random_6_1"));
    }

    #[test]
    fn test_load_instances_sorted_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        DistanceMatrix::random_euclidean(7, 1)
            .write_csv(dir.path().join("b.csv"))
            .unwrap();
        DistanceMatrix::random_euclidean(4, 1)
            .write_csv(dir.path().join("a.csv"))
            .unwrap();
        let mut bad = File::create(dir.path().join("broken.csv")).unwrap();
        writeln!(bad, "X,Y,0,1").unwrap();
        writeln!(bad, "1,2,oops").unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        let instances = load_instances_from_dir(dir.path()).unwrap();
        let sizes: Vec<usize> = instances.iter().map(|m| m.dimension()).collect();
        assert_eq!(sizes, vec![4, 7]);
    }

    #[test]
    fn test_result_log_appends_tab_separated_records() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::new(dir.path().join(DEFAULT_RESULTS_LOG));
        let matrix = DistanceMatrix::new(vec![vec![0.0, 2.0], vec![3.0, 0.0]]).unwrap();
        let outcome = TspSolver::default().solve(&matrix).unwrap();

        log.append("pair.csv", &outcome).unwrap();
        log.append("pair.csv", &outcome).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], "pair.csv");
        assert_eq!(fields[1], "5");
        assert_eq!(fields[3], "[0, 1]");
        assert_eq!(fields[6], "true");
    }
}
