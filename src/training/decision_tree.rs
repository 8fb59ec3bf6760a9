//! CART decision tree used as the base learner of the random forests

use crate::error::{PlatformError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value (class index or mean target)
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Fixed(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    /// Seed for the per-node feature subsets
    pub seed: u64,
    n_features: usize,
    /// Number of classes; targets are class indices in `0..n_classes`
    n_classes: usize,
}

impl DecisionTree {
    /// Create a classifier over `n_classes` class indices
    pub fn new_classifier(n_classes: usize) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::Gini,
            seed: 0,
            n_features: 0,
            n_classes,
        }
    }

    /// Create a regressor
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier(0)
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn is_classification(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PlatformError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PlatformError::Training("cannot fit a tree on zero samples".to_string()));
        }
        if self.is_classification() {
            if let Some(bad) = y.iter().find(|v| **v < 0.0 || (**v as usize) >= self.n_classes) {
                return Err(PlatformError::Training(format!(
                    "class index {} out of range for {} classes",
                    bad, self.n_classes
                )));
            }
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(y, indices),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || self.is_pure(y, indices);
        if should_stop {
            return leaf();
        }

        let k = self.max_features.resolve(self.n_features);
        let mut features = sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();

        match self.find_best_split(x, y, indices, &features) {
            Some((feature_idx, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return leaf();
                }
                let left = Box::new(self.build_tree(x, y, &left_idx, depth + 1, rng));
                let right = Box::new(self.build_tree(x, y, &right_idx, depth + 1, rng));
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                }
            }
            None => leaf(),
        }
    }

    /// Best (feature, threshold) by impurity decrease; each candidate feature is
    /// sorted once and swept left to right.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let parent = self.impurity_of(y, indices);

        let results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (x[[i, feature_idx]], y[i]))
                    .collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left = SplitStats::new(self.n_classes);
                let mut right = SplitStats::new(self.n_classes);
                for &(_, yi) in &pairs {
                    right.add(yi);
                }

                let mut best: Option<(f64, f64)> = None;
                for w in 0..pairs.len() - 1 {
                    let yi = pairs[w].1;
                    left.add(yi);
                    right.remove(yi);

                    if pairs[w].0 == pairs[w + 1].0 {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }
                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;
                    let gain = parent - weighted;
                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (pairs[w].0 + pairs[w + 1].0) / 2.0));
                    }
                }
                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // Highest gain wins; equal gains keep the lowest feature index
        let mut best: Option<(usize, f64, f64)> = None;
        for candidate in results.into_iter().flatten() {
            if best.map_or(true, |b| candidate.2 > b.2) {
                best = Some(candidate);
            }
        }
        best.map(|(f, t, _)| (f, t))
    }

    fn impurity_of(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        let mut stats = SplitStats::new(self.n_classes);
        for &i in indices {
            stats.add(y[i]);
        }
        stats.impurity(self.criterion)
    }

    fn is_pure(&self, y: &Array1<f64>, indices: &[usize]) -> bool {
        let first = y[indices[0]];
        indices.iter().all(|&i| (y[i] - first).abs() < 1e-10)
    }

    fn leaf_value(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        if self.is_classification() {
            let mut counts = vec![0usize; self.n_classes];
            for &i in indices {
                counts[y[i] as usize] += 1;
            }
            majority(&counts) as f64
        } else {
            indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PlatformError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(PlatformError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if row[*feature_idx] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

/// Index of the largest count; ties go to the lowest class index
pub(crate) fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}

/// Running statistics for one side of a candidate split
struct SplitStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl SplitStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        if !self.class_counts.is_empty() {
            self.class_counts[y as usize] += 1;
        }
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if !self.class_counts.is_empty() {
            self.class_counts[y as usize] -= 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            // Var = E[X²] - E[X]²
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 5.0], [1.0, 3.0], [2.0, 4.0], [3.0, 1.0], [4.0, 2.0], [5.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier(2);
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-9, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier(2).with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_regressor();
        let err = tree.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PlatformError::ModelNotFitted));
    }

    #[test]
    fn test_out_of_range_class_rejected() {
        let mut tree = DecisionTree::new_classifier(2);
        let err = tree.fit(&array![[1.0], [2.0]], &array![0.0, 2.0]).unwrap_err();
        assert!(matches!(err, PlatformError::Training(_)));
    }

    #[test]
    fn test_majority_tie_prefers_lowest_class() {
        assert_eq!(majority(&[2, 3, 3]), 1);
        assert_eq!(majority(&[0, 0]), 0);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(4), 4);
        assert_eq!(MaxFeatures::Fixed(9).resolve(4), 4);
    }
}
