//! ANOVA F-test feature selection
//!
//! Each column is scored by how well its per-class means separate the
//! labels; the K best columns survive, kept in their original relative order.

use ndarray::ArrayView1;
use tracing::{debug, info};

use crate::encode::{ColumnSpec, EncodedFeatureMatrix};
use crate::{Error, Result};

/// Result of a selection pass
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFeatureSet {
    /// Indices into the input matrix columns, ascending
    pub indices: Vec<usize>,
    pub columns: Vec<ColumnSpec>,
    /// F statistic of every input column (NaN for constant columns)
    pub scores: Vec<f64>,
}

impl SelectedFeatureSet {
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Top-K selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSelector {
    k: usize,
}

impl FeatureSelector {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Score every column and pick the K best
    pub fn fit(&self, matrix: &EncodedFeatureMatrix) -> Result<SelectedFeatureSet> {
        if self.k == 0 || self.k > matrix.n_cols() {
            return Err(Error::Config(format!(
                "num_features_clf must be within 1..={}, got {}",
                matrix.n_cols(),
                self.k
            )));
        }

        let scores: Vec<f64> = matrix
            .data
            .columns()
            .into_iter()
            .map(|column| f_statistic(column, &matrix.labels))
            .collect::<Result<_>>()?;

        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        // Highest first; NaN ranks last; ties keep the earlier column
        ranked.sort_by(|&a, &b| {
            rank_key(scores[b])
                .total_cmp(&rank_key(scores[a]))
                .then(a.cmp(&b))
        });
        let mut indices: Vec<usize> = ranked.into_iter().take(self.k).collect();
        indices.sort_unstable();

        let columns: Vec<ColumnSpec> = indices.iter().map(|&i| matrix.columns[i].clone()).collect();
        for &i in &indices {
            debug!("Selected {} (F = {:.4})", matrix.columns[i].name, scores[i]);
        }
        info!(
            "Selected {} of {} features: {}",
            self.k,
            matrix.n_cols(),
            columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(SelectedFeatureSet {
            indices,
            columns,
            scores,
        })
    }

    /// Select and project the matrix onto the chosen columns
    pub fn fit_transform(
        &self,
        matrix: &EncodedFeatureMatrix,
    ) -> Result<(SelectedFeatureSet, EncodedFeatureMatrix)> {
        let selected = self.fit(matrix)?;
        let projected = matrix.select_columns(&selected.indices);
        Ok((selected, projected))
    }
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::MIN
    } else {
        score
    }
}

/// Per-class running totals of one column
struct ClassGroup {
    label: u8,
    sum: f64,
    count: usize,
    first: f64,
    constant: bool,
}

/// One-way ANOVA F statistic of a column against the labels
///
/// A column constant within every class is +inf when the class values differ
/// and NaN when the whole column is constant. Constancy is checked on the raw
/// values, not on the rounded sums.
pub fn f_statistic(column: ArrayView1<f64>, labels: &[u8]) -> Result<f64> {
    let n = labels.len();
    let mut groups: Vec<ClassGroup> = Vec::new();
    for (&x, &label) in column.iter().zip(labels) {
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => {
                group.sum += x;
                group.count += 1;
                group.constant &= x == group.first;
            }
            None => groups.push(ClassGroup {
                label,
                sum: x,
                count: 1,
                first: x,
                constant: true,
            }),
        }
    }
    let g = groups.len();
    if g < 2 {
        return Err(Error::Training(format!(
            "feature selection needs at least two classes, found {}",
            g
        )));
    }
    if n <= g {
        return Err(Error::Training(format!(
            "feature selection needs more rows than classes ({} rows)",
            n
        )));
    }

    if groups.iter().all(|group| group.constant) {
        let first = groups[0].first;
        return Ok(if groups.iter().all(|group| group.first == first) {
            f64::NAN
        } else {
            f64::INFINITY
        });
    }

    let grand_mean = column.iter().sum::<f64>() / n as f64;
    let means: Vec<(u8, f64)> = groups
        .iter()
        .map(|group| (group.label, group.sum / group.count as f64))
        .collect();
    let ss_between: f64 = groups
        .iter()
        .zip(&means)
        .map(|(group, &(_, mean))| group.count as f64 * (mean - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = column
        .iter()
        .zip(labels)
        .map(|(&x, &label)| {
            let mean = means
                .iter()
                .find(|(l, _)| *l == label)
                .map_or(grand_mean, |&(_, m)| m);
            (x - mean).powi(2)
        })
        .sum();

    let ms_between = ss_between / (g - 1) as f64;
    let ms_within = ss_within / (n - g) as f64;
    Ok(ms_between / ms_within)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NominalField, OrdinalField};
    use ndarray::{array, Array2};

    fn columns(n: usize) -> Vec<ColumnSpec> {
        (0..n)
            .map(|i| ColumnSpec::indicator(NominalField::City, &i.to_string()))
            .collect()
    }

    fn matrix() -> EncodedFeatureMatrix {
        // col 0 separates perfectly with spread, col 1 is noise,
        // col 2 is constant, col 3 separates weakly
        let data = array![
            [1.0, 3.0, 7.0, 0.0],
            [1.2, 1.0, 7.0, 1.0],
            [0.8, 2.0, 7.0, 0.0],
            [5.0, 2.0, 7.0, 1.0],
            [5.2, 3.0, 7.0, 1.0],
            [4.8, 1.0, 7.0, 0.0],
        ];
        EncodedFeatureMatrix::new(columns(4), data, vec![0, 0, 0, 1, 1, 1]).unwrap()
    }

    #[test]
    fn test_f_statistic_known_value() {
        let column = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        // means 2 and 5, grand 3.5: SSB = 13.5, SSW = 4, F = 13.5 / (4 / 4)
        let f = f_statistic(column.view(), &[0, 0, 0, 1, 1, 1]).unwrap();
        assert!((f - 13.5).abs() < 1e-12);
    }

    #[test]
    fn test_f_statistic_degenerate_columns() {
        let constant = array![2.0, 2.0, 2.0, 2.0];
        assert!(f_statistic(constant.view(), &[0, 0, 1, 1]).unwrap().is_nan());
        let perfect = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(
            f_statistic(perfect.view(), &[0, 0, 1, 1]).unwrap(),
            f64::INFINITY
        );
    }

    #[test]
    fn test_inexact_per_class_constant_is_infinite() {
        let mut values = vec![0.624; 20];
        values.extend(std::iter::repeat(0.92).take(40));
        let mut labels = vec![1u8; 20];
        labels.extend(std::iter::repeat(0u8).take(40));
        let column = ndarray::Array1::from(values);

        assert_eq!(f_statistic(column.view(), &labels).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_inexact_constant_ties_with_indicator_by_position() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let left = i % 3 == 0;
            rows.extend([
                if left { 0.624 } else { 0.92 },
                if left { 1.0 } else { 0.0 },
                if left { 0.0 } else { 1.0 },
            ]);
            labels.push(u8::from(left));
        }
        let data = Array2::from_shape_vec((60, 3), rows).unwrap();
        let input = EncodedFeatureMatrix::new(columns(3), data, labels).unwrap();

        let selected = FeatureSelector::new(2).fit(&input).unwrap();
        assert_eq!(selected.indices, vec![0, 1]);
    }

    #[test]
    fn test_single_class_rejected() {
        let column = array![1.0, 2.0, 3.0];
        assert!(matches!(
            f_statistic(column.view(), &[1, 1, 1]),
            Err(Error::Training(_))
        ));
    }

    #[test]
    fn test_returns_exactly_k_in_original_order() {
        let (selected, projected) = FeatureSelector::new(2).fit_transform(&matrix()).unwrap();
        assert_eq!(selected.indices, vec![0, 3]);
        assert_eq!(selected.names(), vec!["city_0", "city_3"]);
        assert_eq!(projected.n_cols(), 2);
        assert_eq!(projected.data.column(1).to_vec(), vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_constant_column_ranks_last() {
        let selected = FeatureSelector::new(3).fit(&matrix()).unwrap();
        assert_eq!(selected.indices, vec![0, 1, 3]);
    }

    #[test]
    fn test_k_equal_total_keeps_everything() {
        let input = matrix();
        let (selected, projected) = FeatureSelector::new(4).fit_transform(&input).unwrap();
        assert_eq!(selected.indices, vec![0, 1, 2, 3]);
        assert_eq!(projected, input);
    }

    #[test]
    fn test_ties_prefer_first_appearance() {
        let data = Array2::from_shape_vec(
            (4, 3),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let input = EncodedFeatureMatrix::new(columns(3), data, vec![0, 0, 1, 1]).unwrap();
        let selected = FeatureSelector::new(2).fit(&input).unwrap();
        assert_eq!(selected.indices, vec![0, 1]);
    }

    #[test]
    fn test_k_out_of_range_rejected() {
        assert!(matches!(
            FeatureSelector::new(0).fit(&matrix()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FeatureSelector::new(5).fit(&matrix()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_ordinal_names_survive_selection() {
        let data = array![[1.0, 0.0], [2.0, 0.0], [8.0, 1.0], [9.0, 0.0]];
        let cols = vec![
            ColumnSpec::ordinal(OrdinalField::CityDevelopmentIndex),
            ColumnSpec::ordinal(OrdinalField::Experience),
        ];
        let input = EncodedFeatureMatrix::new(cols, data, vec![0, 0, 1, 1]).unwrap();
        let selected = FeatureSelector::new(1).fit(&input).unwrap();
        assert_eq!(selected.names(), vec!["city_development_index"]);
    }
}
