//! Module for loading and representing TSP instances.
//!
//! An instance is an immutable N x N cost table. Costs may be asymmetric; the
//! diagonal is ignored. Instances are loaded from the tabular CSV format
//! (coordinate columns `X`/`Y` followed by the distance columns) or from
//! TSPLIB files with Euclidean coordinates or an explicit full matrix.

use crate::error::{Result, SolverError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// A city location, kept when the instance was built from coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn dist(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Immutable cost table over N cities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceMatrix {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    /// Comment/description
    pub comment: String,
    dimension: usize,
    costs: Vec<Vec<f64>>,
    points: Option<Vec<Point>>,
}

impl DistanceMatrix {
    /// Build a matrix from N rows of N costs. Diagonal entries are ignored.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::named("unnamed", rows)
    }

    pub fn named(name: &str, mut rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        for (i, row) in rows.iter_mut().enumerate() {
            if row.len() != n {
                return Err(SolverError::input(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, value) in row.iter_mut().enumerate() {
                if i == j {
                    *value = 0.0;
                    continue;
                }
                if !value.is_finite() || *value < 0.0 {
                    return Err(SolverError::input(format!(
                        "cost ({}, {}) = {} is not a non-negative finite number",
                        i, j, value
                    )));
                }
            }
        }

        Ok(DistanceMatrix {
            name: name.to_string(),
            comment: String::new(),
            dimension: n,
            costs: rows,
            points: None,
        })
    }

    /// Euclidean instance over the given points
    pub fn from_points(name: &str, points: Vec<Point>) -> Result<Self> {
        let rows = Self::compute_distance_matrix(&points);
        let mut matrix = Self::named(name, rows)?;
        matrix.points = Some(points);
        Ok(matrix)
    }

    /// Random Euclidean instance in a 1000 x 1000 square. Deterministic via seed.
    pub fn random_euclidean(n: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let points: Vec<Point> = (0..n)
            .map(|_| Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
            .collect();
        let rows = Self::compute_distance_matrix(&points);
        DistanceMatrix {
            name: format!("random_{}_{}", n, seed),
            comment: format!("random euclidean, seed {}", seed),
            dimension: n,
            costs: rows,
            points: Some(points),
        }
    }

    /// Load an instance, picking the parser from the file extension
    /// (`.tsp` for TSPLIB, anything else is read as CSV).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SolverError::input(format!("cannot open {}: {}", path.display(), e)))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        let is_tsplib = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("tsp"))
            .unwrap_or(false);

        if is_tsplib {
            Self::from_tsplib_reader(&name, BufReader::new(file))
        } else {
            Self::from_csv_reader(&name, file)
        }
    }

    /// Parse the tabular format: a header row, one row per city, coordinate
    /// columns named `X` and `Y` (any case) dropped, remaining columns are costs.
    pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let cost_columns: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.eq_ignore_ascii_case("x") && !h.eq_ignore_ascii_case("y"))
            .map(|(idx, _)| idx)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let mut row = Vec::with_capacity(cost_columns.len());
            for &col in &cost_columns {
                let field = record.get(col).unwrap_or("");
                let value: f64 = field.parse().map_err(|_| {
                    SolverError::input(format!(
                        "row {}, column '{}': invalid number '{}'",
                        line + 1,
                        &headers[col],
                        field
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SolverError::input("no data rows"));
        }

        Self::named(name, rows)
    }

    /// Parse a TSPLIB file. Supports `NODE_COORD_SECTION` (EUC_2D rounds to the
    /// nearest integer, other types keep the exact distance) and
    /// `EDGE_WEIGHT_SECTION` with `EDGE_WEIGHT_FORMAT: FULL_MATRIX`.
    pub fn from_tsplib_reader<R: BufRead>(default_name: &str, reader: R) -> Result<Self> {
        let mut name = default_name.to_string();
        let mut comment = String::new();
        let mut dimension = 0usize;
        let mut weight_type = String::new();
        let mut weight_format = String::new();
        let mut coords: Vec<(usize, f64, f64)> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();

        let mut section = String::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line == "EOF" {
                continue;
            }

            if line.starts_with("NODE_COORD_SECTION") {
                section = "coords".to_string();
                continue;
            }
            if line.starts_with("EDGE_WEIGHT_SECTION") {
                section = "weights".to_string();
                continue;
            }
            if line.ends_with("_SECTION") {
                section = "ignored".to_string();
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "NAME" => name = value.to_string(),
                    "COMMENT" => comment = value.to_string(),
                    "DIMENSION" => {
                        dimension = value
                            .parse()
                            .map_err(|_| SolverError::input("invalid DIMENSION"))?
                    }
                    "EDGE_WEIGHT_TYPE" => weight_type = value.to_string(),
                    "EDGE_WEIGHT_FORMAT" => weight_format = value.to_string(),
                    _ => {}
                }
                continue;
            }

            match section.as_str() {
                "coords" => {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() >= 3 {
                        let id: usize = parts[0]
                            .parse()
                            .map_err(|_| SolverError::input("invalid node id"))?;
                        let x: f64 = parts[1]
                            .parse()
                            .map_err(|_| SolverError::input("invalid x coordinate"))?;
                        let y: f64 = parts[2]
                            .parse()
                            .map_err(|_| SolverError::input("invalid y coordinate"))?;
                        coords.push((id, x, y));
                    }
                }
                "weights" => {
                    for token in line.split_whitespace() {
                        let w: f64 = token
                            .parse()
                            .map_err(|_| SolverError::input(format!("invalid weight '{}'", token)))?;
                        weights.push(w);
                    }
                }
                _ => {}
            }
        }

        let mut matrix = if !coords.is_empty() {
            coords.sort_by_key(|&(id, _, _)| id);
            let points: Vec<Point> = coords.iter().map(|&(_, x, y)| Point::new(x, y)).collect();
            if dimension != 0 && points.len() != dimension {
                return Err(SolverError::input(format!(
                    "DIMENSION is {} but {} coordinates were read",
                    dimension,
                    points.len()
                )));
            }
            let mut rows = Self::compute_distance_matrix(&points);
            if weight_type == "EUC_2D" {
                for row in rows.iter_mut() {
                    for value in row.iter_mut() {
                        *value = value.round();
                    }
                }
            }
            let mut matrix = Self::named(&name, rows)?;
            matrix.points = Some(points);
            matrix
        } else if !weights.is_empty() {
            if !weight_format.is_empty() && weight_format != "FULL_MATRIX" {
                return Err(SolverError::input(format!(
                    "unsupported EDGE_WEIGHT_FORMAT '{}'",
                    weight_format
                )));
            }
            if weights.len() != dimension * dimension {
                return Err(SolverError::input(format!(
                    "expected {} weights for DIMENSION {}, found {}",
                    dimension * dimension,
                    dimension,
                    weights.len()
                )));
            }
            let rows: Vec<Vec<f64>> = weights.chunks(dimension).map(|c| c.to_vec()).collect();
            Self::named(&name, rows)?
        } else {
            return Err(SolverError::input("no NODE_COORD_SECTION or EDGE_WEIGHT_SECTION"));
        };

        matrix.comment = comment;
        Ok(matrix)
    }

    /// Write the instance in the tabular CSV format (coordinates when known).
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["X".to_string(), "Y".to_string()];
        header.extend((0..self.dimension).map(|j| j.to_string()));
        writer.write_record(&header)?;

        for i in 0..self.dimension {
            let (x, y) = self
                .points
                .as_ref()
                .map(|p| (p[i].x, p[i].y))
                .unwrap_or((0.0, 0.0));
            let mut record = vec![x.to_string(), y.to_string()];
            record.extend(self.costs[i].iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn compute_distance_matrix(points: &[Point]) -> Vec<Vec<f64>> {
        let n = points.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[i][j] = points[i].dist(&points[j]);
                }
            }
        }

        matrix
    }

    /// Number of cities
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Checked cost lookup
    pub fn cost(&self, i: usize, j: usize) -> Result<f64> {
        for index in [i, j] {
            if index >= self.dimension {
                return Err(SolverError::InvalidIndex {
                    index,
                    dimension: self.dimension,
                });
            }
        }
        Ok(self.costs[i][j])
    }

    /// Unchecked cost lookup for indices already known to be in range
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.costs[i][j]
    }

    pub fn points(&self) -> Option<&[Point]> {
        self.points.as_deref()
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.dimension).all(|i| {
            (i + 1..self.dimension).all(|j| (self.costs[i][j] - self.costs[j][i]).abs() < 1e-9)
        })
    }

    /// Closed tour length, wrap-around arc included
    pub fn tour_cost(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }

        let mut length = 0.0;
        for w in tour.windows(2) {
            length += self.distance(w[0], w[1]);
        }

        length += self.distance(tour[tour.len() - 1], tour[0]);

        length
    }

    /// Checked variant of [`tour_cost`](Self::tour_cost)
    pub fn checked_tour_cost(&self, tour: &[usize]) -> Result<f64> {
        if tour.len() < 2 {
            return Ok(0.0);
        }
        let mut length = 0.0;
        for i in 0..tour.len() {
            length += self.cost(tour[i], tour[(i + 1) % tour.len()])?;
        }
        Ok(length)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension {
            for j in 0..self.dimension {
                if i != j {
                    distances.push(self.distance(i, j));
                }
            }
        }
        let (avg_distance, min_distance, max_distance) = if distances.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                distances.iter().sum::<f64>() / distances.len() as f64,
                distances.iter().cloned().fold(f64::INFINITY, f64::min),
                distances.iter().cloned().fold(0.0, f64::max),
            )
        };
        let zero_distance_pairs = distances.iter().filter(|&&d| d == 0.0).count();

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            symmetric: self.is_symmetric(),
            has_coordinates: self.points.is_some(),
            avg_distance,
            min_distance,
            max_distance,
            zero_distance_pairs,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub symmetric: bool,
    pub has_coordinates: bool,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Ordered off-diagonal pairs with zero cost
    pub zero_distance_pairs: usize,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Cities: {}", self.dimension)?;
        writeln!(f, "  Symmetric: {}", self.symmetric)?;
        writeln!(f, "  Coordinates: {}", self.has_coordinates)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.2}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)?;
        writeln!(f, "  Zero-distance pairs: {}", self.zero_distance_pairs)
    }
}
