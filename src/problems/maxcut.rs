//! Weighted maximum cut.
//!
//! Each bit assigns a vertex to one side of the cut; fitness is the total
//! weight of edges whose endpoints are on different sides.

use crate::error::{LtgaError, Result};
use crate::ltga::FitnessFunction;

/// A weighted undirected graph scored as a max-cut instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaxCut {
    vertices: usize,
    /// Row-major symmetric weight matrix; the diagonal is unused.
    weights: Vec<f64>,
    best_known: Option<f64>,
    average_random: Option<f64>,
}

impl MaxCut {
    /// A graph with `vertices` vertices and no edges.
    pub fn new(vertices: usize) -> Self {
        Self {
            vertices,
            weights: vec![0.0; vertices * vertices],
            best_known: None,
            average_random: None,
        }
    }

    /// Builds a graph from `(u, v, weight)` triples (0-based vertices).
    ///
    /// # Errors
    /// Fails on self-loops, out-of-range vertices or non-finite weights.
    pub fn from_edges(vertices: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        let mut graph = Self::new(vertices);
        for &(u, v, w) in edges {
            graph.add_edge(u, v, w)?;
        }
        Ok(graph)
    }

    /// Adds `weight` to edge `{u, v}`.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) -> Result<()> {
        if u >= self.vertices || v >= self.vertices {
            return Err(LtgaError::config(
                "edge",
                format!("({u}, {v}) is outside 0..{}", self.vertices),
            ));
        }
        if u == v {
            return Err(LtgaError::config("edge", format!("self-loop on vertex {u}")));
        }
        if !weight.is_finite() {
            return Err(LtgaError::config("edge", "weight must be finite"));
        }
        self.weights[u * self.vertices + v] += weight;
        self.weights[v * self.vertices + u] += weight;
        Ok(())
    }

    /// Records the best-known cut value, reported as the optimum.
    pub fn with_best_known(mut self, value: f64) -> Self {
        self.best_known = Some(value);
        self
    }

    /// Records the average cut value of random assignments.
    pub fn with_average_random(mut self, value: f64) -> Self {
        self.average_random = Some(value);
        self
    }

    pub fn vertices(&self) -> usize {
        self.vertices
    }

    pub fn weight(&self, u: usize, v: usize) -> f64 {
        self.weights[u * self.vertices + v]
    }

    pub fn best_known(&self) -> Option<f64> {
        self.best_known
    }

    pub fn average_random(&self) -> Option<f64> {
        self.average_random
    }

    /// Position of `fitness` between the random-assignment average (0) and
    /// the best-known value (1), when both references are set.
    pub fn relative_quality(&self, fitness: f64) -> Option<f64> {
        let (best, random) = (self.best_known?, self.average_random?);
        (best != random).then(|| (fitness - random) / (best - random))
    }
}

impl FitnessFunction for MaxCut {
    fn problem_length(&self) -> usize {
        self.vertices
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        let n = self.vertices;
        let mut total = 0.0;
        for i in 0..n {
            let row = &self.weights[i * n..(i + 1) * n];
            for j in (i + 1)..n {
                if genes[i] != genes[j] {
                    total += row[j];
                }
            }
        }
        Ok(total)
    }

    fn optimum_known(&self) -> Option<f64> {
        self.best_known
    }
}
