//! Synthetic minority oversampling
//!
//! When enabled, new minority-class rows are interpolated between a minority
//! row and one of its nearest minority neighbours until both classes have the
//! same count. Synthetic rows are appended after the originals.

use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::encode::EncodedFeatureMatrix;
use crate::{Error, Result};

/// Default neighbour count for interpolation
pub const DEFAULT_K_NEIGHBORS: usize = 5;

/// Optional class rebalancing stage
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBalancer {
    enabled: bool,
    k_neighbors: usize,
    seed: u64,
}

impl ClassBalancer {
    pub fn new(enabled: bool, seed: u64) -> Self {
        Self {
            enabled,
            k_neighbors: DEFAULT_K_NEIGHBORS,
            seed,
        }
    }

    pub fn with_k_neighbors(mut self, k_neighbors: usize) -> Result<Self> {
        if k_neighbors == 0 {
            return Err(Error::Config("k_neighbors must be positive".to_string()));
        }
        self.k_neighbors = k_neighbors;
        Ok(self)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rebalance the matrix, or hand it back unchanged when disabled
    pub fn apply(&self, matrix: EncodedFeatureMatrix) -> Result<EncodedFeatureMatrix> {
        if !self.enabled {
            return Ok(matrix);
        }

        let counts = matrix.class_counts();
        if counts.len() != 2 {
            return Err(Error::Training(format!(
                "oversampling needs exactly two classes, found {}",
                counts.len()
            )));
        }
        let (minority, n_minor, n_major) = if counts[0].1 <= counts[1].1 {
            (counts[0].0, counts[0].1, counts[1].1)
        } else {
            (counts[1].0, counts[1].1, counts[0].1)
        };
        let needed = n_major - n_minor;
        if needed == 0 {
            info!("Classes already balanced ({} rows each)", n_minor);
            return Ok(matrix);
        }
        if n_minor < 2 {
            return Err(Error::Training(format!(
                "oversampling needs at least 2 minority rows, found {}",
                n_minor
            )));
        }

        let minority_rows: Vec<usize> = matrix
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == minority)
            .map(|(i, _)| i)
            .collect();
        let samples = matrix.data.select(Axis(0), &minority_rows);
        let k = self.k_neighbors.min(n_minor - 1);
        let neighbours = nearest_neighbours(&samples, k);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic = Array2::<f64>::zeros((needed, matrix.n_cols()));
        for mut out in synthetic.rows_mut() {
            let base = rng.gen_range(0..n_minor);
            let neighbour = neighbours[base][rng.gen_range(0..k)];
            let gap: f64 = rng.gen();
            let from = samples.row(base);
            let to = samples.row(neighbour);
            for ((o, &a), &b) in out.iter_mut().zip(from.iter()).zip(to.iter()) {
                *o = a + gap * (b - a);
            }
        }

        let data = ndarray::concatenate(Axis(0), &[matrix.data.view(), synthetic.view()])
            .map_err(|e| Error::Training(format!("append synthetic rows failed: {}", e)))?;
        let mut labels = matrix.labels;
        labels.extend(std::iter::repeat(minority).take(needed));

        info!(
            "Oversampled class {} with {} synthetic rows ({} rows per class)",
            minority, needed, n_major
        );
        EncodedFeatureMatrix::new(matrix.columns, data, labels)
    }
}

/// Indices of the `k` nearest other rows of every row, closest first
fn nearest_neighbours(samples: &Array2<f64>, k: usize) -> Vec<Vec<usize>> {
    let n = samples.nrows();
    (0..n)
        .map(|i| {
            let row = samples.row(i);
            let mut distances: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (squared_distance(row, samples.row(j)), j))
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
