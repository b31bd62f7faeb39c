//! tsp-bnc - Command Line Interface
//!
//! Exact branch-and-cut solver for the Traveling Salesman Problem.

use clap::{Parser, Subcommand};
use tsp_bnc::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig, ResultLog, DEFAULT_RESULTS_LOG};
use tsp_bnc::error::Result;
use tsp_bnc::exact::relaxation::{EdgeFixings, RelaxationSolver};
use tsp_bnc::exact::{SolverConfig, TspSolver};
use tsp_bnc::heuristics::{self, ConstructionHeuristic, NearestNeighborHeuristic};
use tsp_bnc::instance::DistanceMatrix;
use tsp_bnc::solution::SolveOutcome;

use std::path::{Path, PathBuf};

/// Exit code when the solve finished without a tour
const EXIT_NO_TOUR: i32 = 2;

#[derive(Parser)]
#[command(name = "tsp-bnc")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Exact branch-and-cut solver for the Traveling Salesman Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance to optimality (or until the time limit)
    Solve {
        /// Instance file (.csv distance table or TSPLIB .tsp)
        input: PathBuf,

        /// Time limit in seconds
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Worker threads for node expansion (1 = deterministic)
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Stop after this many expanded nodes
        #[arg(long)]
        node_limit: Option<usize>,

        /// Cut rounds per node before branching
        #[arg(long, default_value = "25")]
        max_cut_rounds: usize,

        /// Seed the search with a heuristic tour
        #[arg(long)]
        warm_start: bool,

        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Results log receiving one tab-separated line per solve
        #[arg(long, default_value = DEFAULT_RESULTS_LOG)]
        log_file: PathBuf,

        /// Do not append to the results log
        #[arg(long)]
        no_log: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Time limit per instance
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Worker threads for node expansion
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Seed every search with a heuristic tour
        #[arg(long)]
        warm_start: bool,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a random Euclidean instance in the CSV input format
    Generate {
        /// Number of cities
        #[arg(short, long)]
        cities: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let status = match cli.command {
        Commands::Solve {
            input,
            time_limit,
            threads,
            node_limit,
            max_cut_rounds,
            warm_start,
            output,
            log_file,
            no_log,
            verbose,
        } => {
            let config = SolverConfig {
                time_limit,
                threads,
                node_limit,
                max_cut_rounds,
                warm_start,
                ..Default::default()
            };
            let log = if no_log { None } else { Some(ResultLog::new(log_file)) };
            solve_instance(&input, config, output, log, verbose)
        }

        Commands::Benchmark {
            dir,
            output,
            time_limit,
            threads,
            warm_start,
            max_size,
        } => {
            let solver = SolverConfig {
                time_limit,
                threads,
                warm_start,
                ..Default::default()
            };
            run_benchmark(&dir, &output, solver, max_size)
        }

        Commands::Analyze { input } => analyze_instance(&input),

        Commands::Generate {
            cities,
            seed,
            output,
        } => generate_instance(cities, seed, &output),
    };

    match status {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) if e.is_internal() => {
            eprintln!("Internal solver error: {}", e);
            std::process::exit(e.exit_code());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn load(path: &Path) -> Result<DistanceMatrix> {
    println!("Loading instance from {:?}...", path);
    DistanceMatrix::from_file(path)
}

fn solve_instance(
    path: &Path,
    config: SolverConfig,
    output: Option<PathBuf>,
    log: Option<ResultLog>,
    verbose: bool,
) -> Result<i32> {
    let matrix = load(path)?;

    if verbose {
        println!("{}", matrix.statistics());
    }

    let outcome = TspSolver::new(config).solve(&matrix)?;

    println!("\n========== Results ==========");
    print!("{}", outcome);

    if let Some(log) = &log {
        log.append(&path.to_string_lossy(), &outcome)?;
        println!("\nOutput written to {:?}", log.path());
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(&out_path, json)?;
        println!("Solution saved to {:?}", out_path);
    }

    Ok(match outcome {
        SolveOutcome::Solved(_) => 0,
        SolveOutcome::NoFeasibleSolution { .. } => EXIT_NO_TOUR,
    })
}

fn run_benchmark(dir: &Path, output: &Path, solver: SolverConfig, max_size: Option<usize>) -> Result<i32> {
    println!("Loading instances from {:?}...", dir);

    let instances = load_instances_from_dir(dir)?;
    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(1);
    }

    std::fs::create_dir_all(output)?;

    let config = BenchmarkConfig {
        solver,
        max_size,
        ..Default::default()
    };

    let mut benchmark = Benchmark::new(config);
    benchmark.run_on_instances(&instances)?;

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(0)
}

fn analyze_instance(path: &Path) -> Result<i32> {
    let matrix = load(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", matrix.statistics());

    if matrix.dimension() < 2 {
        println!("Fewer than two cities: no tour exists.");
        return Ok(EXIT_NO_TOUR);
    }

    let root = RelaxationSolver::new(&matrix).solve(&EdgeFixings::new(), &[])?;
    let nn = NearestNeighborHeuristic::new().construct(&matrix);

    println!("\nQuick Estimates:");
    if let Some(bound) = root.bound() {
        println!("  Assignment lower bound: {:.2}", bound);
    }
    println!("  Nearest Neighbor: {:.2}", nn.cost);
    if let Some(best) = heuristics::warm_start(&matrix) {
        println!("  Multi-Start NN + VND: {:.2}", best.cost);
        if let Some(bound) = root.bound() {
            println!(
                "  Heuristic gap to bound: {:.2}%",
                tsp_bnc::solution::relative_gap(best.cost, bound) * 100.0
            );
        }
    }

    Ok(0)
}

fn generate_instance(cities: usize, seed: u64, output: &Path) -> Result<i32> {
    let matrix = DistanceMatrix::random_euclidean(cities, seed);
    matrix.write_csv(output)?;
    println!("Instance {} ({} cities) written to {:?}", matrix.name, cities, output);
    Ok(0)
}
