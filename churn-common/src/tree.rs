//! Depth-bounded CART decision tree classifier
//!
//! Gini impurity, binary splits at midpoints between consecutive distinct
//! feature values. Candidate features are visited in a seeded random order
//! at each node and only a strictly better split replaces the current best,
//! so fitting is reproducible for a given seed.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Index of a node in [`DecisionTree::nodes`]
pub type NodeIndex = usize;

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `row[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
    },
    /// Terminal node; `counts` is aligned with [`DecisionTree::classes`]
    Leaf { class: u8, counts: Vec<usize> },
}

/// Fitting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionTreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl DecisionTreeConfig {
    pub fn new(max_depth: usize, seed: u64) -> Self {
        Self {
            max_depth,
            min_samples_split: 2,
            seed,
        }
    }
}

/// Fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    n_features: usize,
    classes: Vec<u8>,
    nodes: Vec<Node>,
}

struct Builder<'a> {
    config: DecisionTreeConfig,
    x: ArrayView2<'a, f64>,
    /// Class index of every training row
    y: Vec<usize>,
    n_classes: usize,
    rng: StdRng,
    nodes: Vec<Node>,
    classes: &'a [u8],
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Fit on the rows of `x` labelled by `y`
    pub fn fit(config: DecisionTreeConfig, x: ArrayView2<f64>, y: &[u8]) -> Result<Self> {
        if config.max_depth == 0 {
            return Err(Error::Config("max_depth must be a positive integer".to_string()));
        }
        if x.nrows() == 0 {
            return Err(Error::Training("cannot fit a tree on zero rows".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(Error::Training(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let mut classes: Vec<u8> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let class_index: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let mut builder = Builder {
            config,
            x: x.view(),
            y: class_index,
            n_classes: classes.len(),
            rng: StdRng::seed_from_u64(config.seed),
            nodes: Vec::new(),
            classes: &classes,
        };
        let rows: Vec<usize> = (0..x.nrows()).collect();
        builder.grow(rows, 0);
        let nodes = builder.nodes;

        Ok(Self {
            n_features: x.ncols(),
            classes,
            nodes,
        })
    }

    /// Class of a single row
    pub fn predict_row(&self, row: &[f64]) -> Result<u8> {
        if row.len() != self.n_features {
            return Err(Error::InputSchema(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                Some(Node::Leaf { class, .. }) => return Ok(*class),
                None => {
                    return Err(Error::ModelPersistence(format!(
                        "tree references missing node {}",
                        index
                    )))
                }
            }
        }
    }

    /// Class of every row of `x`
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<u8>> {
        x.rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.predict_row(slice),
                None => self.predict_row(&row.to_vec()),
            })
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Check node references of a tree read from outside
    ///
    /// Split features must be within the input width and children must come
    /// after their parent, which rules out cycles.
    pub fn check_structure(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::ModelPersistence("tree has no nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return Err(Error::ModelPersistence(format!(
                        "node {} splits on feature {} of {}",
                        index, feature, self.n_features
                    )));
                }
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(Error::ModelPersistence(format!(
                            "node {} points to invalid child {}",
                            index, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Longest root-to-leaf path, in splits
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: NodeIndex) -> usize {
            match nodes.get(index) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Builder<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> NodeIndex {
        let counts = self.class_counts(&rows);
        let index = self.nodes.len();
        let leaf = self.leaf(&counts);
        self.nodes.push(leaf);

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.config.max_depth || rows.len() < self.config.min_samples_split {
            return index;
        }

        let Some(split) = self.best_split(&rows) else {
            return index;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, split.feature]] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);

        let n = rows.len() as f64;
        let total = self.class_counts(rows);
        let mut best: Option<BestSplit> = None;

        for feature in features {
            let mut sorted: Vec<(f64, usize)> = rows
                .iter()
                .map(|&r| (self.x[[r, feature]], self.y[r]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            for i in 0..sorted.len() - 1 {
                left[sorted[i].1] += 1;
                let (value, next) = (sorted[i].0, sorted[i + 1].0);
                if value >= next {
                    continue;
                }

                let n_left = (i + 1) as f64;
                let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                let impurity = (n_left * gini(&left) + (n - n_left) * gini(&right)) / n;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    /// Majority class; ties go to the lower label
    fn leaf(&self, counts: &[usize]) -> Node {
        let mut winner = 0;
        for (i, &c) in counts.iter().enumerate() {
            if c > counts[winner] {
                winner = i;
            }
        }
        Node::Leaf {
            class: self.classes[winner],
            counts: counts.to_vec(),
        }
    }
}

fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn xor_like() -> (Array2<f64>, Vec<u8>) {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.1, 0.1],
            [0.1, 0.9],
            [0.9, 0.1],
            [0.9, 0.9],
        ];
        (x, vec![0, 1, 1, 0, 0, 1, 1, 0])
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0]), 0.0);
        assert!((gini(&[2, 2]) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[]), 0.0);
    }

    #[test]
    fn test_single_threshold_separates() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTree::fit(DecisionTreeConfig::new(3, 0), x.view(), &y).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        match &tree.nodes()[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 6.5);
            }
            other => panic!("expected split, got {:?}", other),
        }
        assert_eq!(tree.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_depth_bound_respected() {
        let (x, y) = xor_like();
        let stump = DecisionTree::fit(DecisionTreeConfig::new(1, 0), x.view(), &y).unwrap();
        assert!(stump.depth() <= 1);

        let deep = DecisionTree::fit(DecisionTreeConfig::new(4, 0), x.view(), &y).unwrap();
        assert!(deep.depth() <= 4);
    }

    #[test]
    fn test_two_level_interaction_fits_exactly() {
        // class 1 iff both coordinates are large
        let x = array![[1.0, 1.0], [1.0, 9.0], [9.0, 1.0], [9.0, 9.0], [8.0, 8.0], [2.0, 8.0]];
        let y = vec![0, 0, 0, 1, 1, 0];
        let tree = DecisionTree::fit(DecisionTreeConfig::new(2, 0), x.view(), &y).unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict(x.view()).unwrap(), y);
        assert_eq!(tree.predict_row(&[7.0, 7.0]).unwrap(), 1);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0]];
        let tree = DecisionTree::fit(DecisionTreeConfig::new(5, 0), x.view(), &[1, 1]).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(&[100.0]).unwrap(), 1);
    }

    #[test]
    fn test_constant_features_give_majority_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let tree = DecisionTree::fit(DecisionTreeConfig::new(5, 0), x.view(), &[1, 0, 1]).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(&[1.0]).unwrap(), 1);
    }

    #[test]
    fn test_leaf_tie_goes_to_lower_class() {
        let x = array![[1.0], [1.0]];
        let tree = DecisionTree::fit(DecisionTreeConfig::new(5, 0), x.view(), &[1, 0]).unwrap();
        assert_eq!(tree.predict_row(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let (x, y) = xor_like();
        let a = DecisionTree::fit(DecisionTreeConfig::new(3, 11), x.view(), &y).unwrap();
        let b = DecisionTree::fit(DecisionTreeConfig::new(3, 11), x.view(), &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_is_stable_across_calls() {
        let (x, y) = xor_like();
        let tree = DecisionTree::fit(DecisionTreeConfig::new(3, 0), x.view(), &y).unwrap();
        let first = tree.predict_row(&[0.2, 0.8]).unwrap();
        for _ in 0..10 {
            assert_eq!(tree.predict_row(&[0.2, 0.8]).unwrap(), first);
        }
    }

    #[test]
    fn test_fitted_tree_passes_structure_check() {
        let (x, y) = xor_like();
        let tree = DecisionTree::fit(DecisionTreeConfig::new(4, 1), x.view(), &y).unwrap();
        assert!(tree.check_structure().is_ok());
    }

    #[test]
    fn test_out_of_range_feature_fails_structure_check() {
        let tree = DecisionTree {
            n_features: 2,
            classes: vec![0, 1],
            nodes: vec![
                Node::Split {
                    feature: 7,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { class: 0, counts: vec![1, 0] },
                Node::Leaf { class: 1, counts: vec![0, 1] },
            ],
        };
        assert!(matches!(tree.check_structure(), Err(Error::ModelPersistence(_))));
    }

    #[test]
    fn test_cyclic_children_fail_structure_check() {
        let tree = DecisionTree {
            n_features: 1,
            classes: vec![0, 1],
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { class: 1, counts: vec![0, 1] },
            ],
        };
        assert!(matches!(tree.check_structure(), Err(Error::ModelPersistence(_))));
    }

    #[test]
    fn test_wrong_width_rejected() {
        let (x, y) = xor_like();
        let tree = DecisionTree::fit(DecisionTreeConfig::new(2, 0), x.view(), &y).unwrap();
        assert!(matches!(tree.predict_row(&[0.0]), Err(Error::InputSchema(_))));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let (x, y) = xor_like();
        assert!(matches!(
            DecisionTree::fit(DecisionTreeConfig::new(0, 0), x.view(), &y),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let (x, y) = xor_like();
        let tree = DecisionTree::fit(DecisionTreeConfig::new(3, 0), x.view(), &y).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(x.view()).unwrap(), tree.predict(x.view()).unwrap());
    }
}
