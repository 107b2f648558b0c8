//! Cross-validated decision tree selection
//!
//! Each fold trains its own tree on the remaining folds and is scored on the
//! held-out rows. The tree of the best-scoring fold (first one on ties) is
//! the deployable model: it is not refit on the full data and folds are not
//! ensembled. Picking the maximum held-out score makes the headline metric
//! optimistic; the mean is reported alongside for reference.

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{CvStrategy, Scoring, TrainingConfig};
use crate::encode::EncodedFeatureMatrix;
use crate::tree::{DecisionTree, DecisionTreeConfig};
use crate::{Error, Result};

/// Default number of cross-validation folds
pub const DEFAULT_FOLDS: usize = 5;

/// Per-fold outcome of a cross-validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub scoring: Scoring,
    pub strategy: CvStrategy,
    pub fold_scores: Vec<f64>,
    /// Index of the first fold reaching the maximum score
    pub best_fold: usize,
    /// Headline metric: the maximum held-out score, never the mean
    pub best_score: f64,
    pub mean_score: f64,
}

/// Winning tree and the report that chose it
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub tree: DecisionTree,
    pub report: CrossValidationReport,
}

/// K-fold trainer and selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSelector {
    folds: usize,
    strategy: CvStrategy,
    scoring: Scoring,
    max_depth: usize,
    seed: u64,
}

impl ModelSelector {
    pub fn new(max_depth: usize, seed: u64) -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            strategy: CvStrategy::default(),
            scoring: Scoring::Accuracy,
            max_depth,
            seed,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            folds: config.cv_folds,
            strategy: config.cv_strategy,
            scoring: config.scoring,
            max_depth: config.max_depth,
            seed: config.seed,
        }
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_strategy(mut self, strategy: CvStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Train one tree per fold and keep the best one
    pub fn select(&self, matrix: &EncodedFeatureMatrix) -> Result<ModelSelection> {
        let test_folds = fold_assignments(&matrix.labels, self.folds, self.strategy)?;
        let tree_config = DecisionTreeConfig::new(self.max_depth, self.seed);

        let mut best: Option<(usize, f64, DecisionTree)> = None;
        let mut fold_scores = Vec::with_capacity(self.folds);
        for (fold, test) in test_folds.iter().enumerate() {
            let mut train: Vec<usize> = test_folds
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != fold)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            train.sort_unstable();

            let x_train = matrix.data.select(Axis(0), &train);
            let y_train: Vec<u8> = train.iter().map(|&i| matrix.labels[i]).collect();
            let tree = DecisionTree::fit(tree_config, x_train.view(), &y_train)?;

            let x_test = matrix.data.select(Axis(0), test);
            let y_test: Vec<u8> = test.iter().map(|&i| matrix.labels[i]).collect();
            let predicted = tree.predict(x_test.view())?;
            let fold_score = score(self.scoring, &y_test, &predicted);
            debug!(
                "Fold {}: {} train rows, {} test rows, {} = {:.4}, depth {}",
                fold,
                train.len(),
                test.len(),
                self.scoring.name(),
                fold_score,
                tree.depth()
            );
            fold_scores.push(fold_score);

            if best.as_ref().map_or(true, |(_, s, _)| fold_score > *s) {
                best = Some((fold, fold_score, tree));
            }
        }

        let (best_fold, best_score, tree) = best
            .ok_or_else(|| Error::Training("cross-validation produced no folds".to_string()))?;
        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;

        info!(
            "Best fold {} of {}: {} {:.4} (mean over folds {:.4})",
            best_fold + 1,
            self.folds,
            self.scoring.name(),
            best_score,
            mean_score
        );
        warn!("Reported score is the best single fold, an optimistic estimate of generalization");

        Ok(ModelSelection {
            tree,
            report: CrossValidationReport {
                scoring: self.scoring,
                strategy: self.strategy,
                fold_scores,
                best_fold,
                best_score,
                mean_score,
            },
        })
    }
}

/// Held-out row indices of every fold, each ascending
///
/// Every row appears in exactly one fold.
pub fn fold_assignments(
    labels: &[u8],
    folds: usize,
    strategy: CvStrategy,
) -> Result<Vec<Vec<usize>>> {
    if folds < 2 {
        return Err(Error::Config(format!("cv_folds must be at least 2, got {}", folds)));
    }
    if labels.len() < folds {
        return Err(Error::Training(format!(
            "{} rows cannot be split into {} folds",
            labels.len(),
            folds
        )));
    }

    let assignment = match strategy {
        CvStrategy::Sequential => sequential_assignment(labels.len(), folds),
        CvStrategy::Stratified => stratified_assignment(labels, folds)?,
    };

    let mut test_folds = vec![Vec::new(); folds];
    for (row, &fold) in assignment.iter().enumerate() {
        test_folds[fold].push(row);
    }
    if let Some(empty) = test_folds.iter().position(|rows| rows.is_empty()) {
        return Err(Error::Training(format!("fold {} has no held-out rows", empty)));
    }
    Ok(test_folds)
}

/// Contiguous blocks; the first `n % folds` blocks take one extra row
fn sequential_assignment(n: usize, folds: usize) -> Vec<usize> {
    let base = n / folds;
    let extra = n % folds;
    let mut assignment = Vec::with_capacity(n);
    for fold in 0..folds {
        let size = base + usize::from(fold < extra);
        assignment.extend(std::iter::repeat(fold).take(size));
    }
    assignment
}

/// Per class, rows in original order fill folds 0..k in contiguous chunks.
///
/// Chunk sizes come from dealing the class-sorted labels round-robin over the
/// folds, which keeps every fold's class mix close to the overall one.
fn stratified_assignment(labels: &[u8], folds: usize) -> Result<Vec<usize>> {
    let mut classes: Vec<u8> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let class_sizes: Vec<usize> = classes
        .iter()
        .map(|c| labels.iter().filter(|&&l| l == *c).count())
        .collect();
    if class_sizes.iter().all(|&size| size < folds) {
        return Err(Error::Training(format!(
            "every class has fewer than {} rows; cannot stratify",
            folds
        )));
    }
    if let Some(&smallest) = class_sizes.iter().min() {
        if smallest < folds {
            warn!(
                "Least populated class has {} rows, fewer than {} folds",
                smallest, folds
            );
        }
    }

    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    // allocation[fold][class]: class rows dealt to that fold
    let mut allocation = vec![vec![0usize; classes.len()]; folds];
    for (i, label) in sorted.iter().enumerate() {
        let class = classes.binary_search(label).unwrap_or_default();
        allocation[i % folds][class] += 1;
    }

    let mut assignment = vec![0usize; labels.len()];
    for (class_idx, class) in classes.iter().enumerate() {
        let mut chunk_folds = (0..folds)
            .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class_idx]));
        for (row, _) in labels.iter().enumerate().filter(|(_, l)| *l == class) {
            assignment[row] = chunk_folds.next().unwrap_or(folds - 1);
        }
    }
    Ok(assignment)
}

/// Score predictions against the truth
pub fn score(scoring: Scoring, truth: &[u8], predicted: &[u8]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    match scoring {
        Scoring::Accuracy => {
            let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
            correct as f64 / truth.len() as f64
        }
        Scoring::BalancedAccuracy => {
            let mut classes: Vec<u8> = truth.to_vec();
            classes.sort_unstable();
            classes.dedup();
            let recalls: f64 = classes
                .iter()
                .map(|class| {
                    let (hit, total) = truth
                        .iter()
                        .zip(predicted)
                        .filter(|(t, _)| *t == class)
                        .fold((0usize, 0usize), |(hit, total), (t, p)| {
                            (hit + usize::from(t == p), total + 1)
                        });
                    hit as f64 / total as f64
                })
                .sum();
            recalls / classes.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ColumnSpec;
    use crate::record::OrdinalField;
    use ndarray::Array2;

    fn labelled(n: usize) -> EncodedFeatureMatrix {
        // one informative column, one noise column; labels noisy near the boundary
        let mut data = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let x = i as f64;
            data.push(x);
            data.push(((i * 7) % 5) as f64);
            let flip = i % 9 == 4;
            let label = u8::from(x >= n as f64 / 2.0) ^ u8::from(flip);
            labels.push(label);
        }
        let columns = vec![
            ColumnSpec::ordinal(OrdinalField::Experience),
            ColumnSpec::ordinal(OrdinalField::TrainingHours),
        ];
        EncodedFeatureMatrix::new(columns, Array2::from_shape_vec((n, 2), data).unwrap(), labels)
            .unwrap()
    }

    #[test]
    fn test_sequential_blocks() {
        let folds = fold_assignments(&[0; 7], 3, CvStrategy::Sequential).unwrap();
        assert_eq!(folds, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_stratified_partition_and_balance() {
        let labels = [0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 1];
        let folds = fold_assignments(&labels, 5, CvStrategy::Stratified).unwrap();

        let mut seen: Vec<usize> = folds.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..labels.len()).collect::<Vec<_>>());

        for rows in &folds {
            let positives = rows.iter().filter(|&&r| labels[r] == 1).count();
            assert_eq!(rows.len(), 3);
            assert_eq!(positives, 1);
        }
        // class 0 rows in original order land in contiguous chunks
        assert_eq!(folds[0], vec![0, 1, 6]);
    }

    #[test]
    fn test_too_few_rows_rejected() {
        assert!(matches!(
            fold_assignments(&[0, 1, 0], 5, CvStrategy::Sequential),
            Err(Error::Training(_))
        ));
        assert!(matches!(
            fold_assignments(&[0, 1, 0], 1, CvStrategy::Sequential),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_accuracy_and_balanced_accuracy() {
        let truth = [0, 0, 0, 1];
        let predicted = [0, 0, 0, 0];
        assert_eq!(score(Scoring::Accuracy, &truth, &predicted), 0.75);
        assert_eq!(score(Scoring::BalancedAccuracy, &truth, &predicted), 0.5);
    }

    #[test]
    fn test_reported_score_is_max_not_mean() {
        let matrix = labelled(60);
        let selection = ModelSelector::new(3, 0).select(&matrix).unwrap();
        let report = &selection.report;

        assert_eq!(report.fold_scores.len(), 5);
        let max = report.fold_scores.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(report.best_score, max);
        assert_eq!(report.fold_scores[report.best_fold], max);
        assert!(report.best_score >= report.mean_score);
        // first fold wins ties
        let first = report.fold_scores.iter().position(|&s| s == max).unwrap();
        assert_eq!(report.best_fold, first);
    }

    #[test]
    fn test_selection_is_reproducible() {
        let matrix = labelled(45);
        let selector = ModelSelector::new(4, 3).with_strategy(CvStrategy::Sequential);
        let a = selector.select(&matrix).unwrap();
        let b = selector.select(&matrix).unwrap();
        assert_eq!(a.report, b.report);
        assert_eq!(a.tree, b.tree);
    }

    #[test]
    fn test_winning_tree_scores_best_score_on_its_fold() {
        let matrix = labelled(50);
        let selector = ModelSelector::new(2, 0).with_folds(5);
        let selection = selector.select(&matrix).unwrap();
        let folds = fold_assignments(&matrix.labels, 5, CvStrategy::Stratified).unwrap();
        let test = &folds[selection.report.best_fold];

        let x_test = matrix.data.select(Axis(0), test);
        let y_test: Vec<u8> = test.iter().map(|&i| matrix.labels[i]).collect();
        let predicted = selection.tree.predict(x_test.view()).unwrap();
        assert_eq!(
            score(Scoring::Accuracy, &y_test, &predicted),
            selection.report.best_score
        );
    }
}
