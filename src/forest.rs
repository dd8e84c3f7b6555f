//! Bagged `linfa-trees` decision trees over 0/1 features.
//!
//! Each tree is a Gini `DecisionTree` fitted on its own bootstrap sample; the
//! sample indices come from a per-tree `StdRng` derived from the forest seed.
//! Class probabilities are the share of trees voting for each class.

use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::classifier::{Classifier, ClassifierError, check_training_input};
use crate::dataset::{FeatureVector, Outcome};

#[derive(Debug, Clone, Copy)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    classes: Vec<Outcome>,
    n_features: usize,
    // Trees predict indices into `classes`.
    trees: Vec<DecisionTree<f64, usize>>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(ForestConfig {
            seed,
            ..ForestConfig::default()
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn check_input(&self, x: &FeatureVector) -> Result<(), ClassifierError> {
        if !self.is_fitted() {
            return Err(ClassifierError::NotFitted);
        }
        if x.len() != self.n_features {
            return Err(ClassifierError::WidthMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }
        Ok(())
    }

    fn votes(&self, x: &FeatureVector) -> Vec<usize> {
        let row = records(std::slice::from_ref(x), self.n_features);
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(&row);
            if let Some(slot) = predicted.first().and_then(|idx| votes.get_mut(*idx)) {
                *slot += 1;
            }
        }
        votes
    }
}

impl Classifier for RandomForest {
    fn fit(
        &mut self,
        features: &[FeatureVector],
        labels: &[Outcome],
    ) -> Result<(), ClassifierError> {
        let n_features = check_training_input(features, labels)?;

        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        let targets: Array1<usize> = labels
            .iter()
            .map(|l| classes.iter().position(|c| c == l).unwrap_or(0))
            .collect();
        let x = records(features, n_features);

        let params = DecisionTree::<f64, usize>::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(self.config.max_depth)
            .min_weight_split(self.config.min_samples_split.max(2) as f32);

        let n = features.len();
        let seed = self.config.seed;
        let trees = (0..self.config.n_trees.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(seed, t));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let bag = Dataset::new(
                    x.select(Axis(0), &sample),
                    targets.select(Axis(0), &sample),
                );
                params
                    .fit(&bag)
                    .map_err(|err| ClassifierError::Backend(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.classes = classes;
        self.n_features = n_features;
        self.trees = trees;
        Ok(())
    }

    fn classes(&self) -> &[Outcome] {
        &self.classes
    }

    fn predict_one(&self, x: &FeatureVector) -> Result<Outcome, ClassifierError> {
        self.check_input(x)?;
        let votes = self.votes(x);
        let mut best = 0usize;
        for (idx, v) in votes.iter().enumerate() {
            if *v > votes[best] {
                best = idx;
            }
        }
        Ok(self.classes[best])
    }

    fn predict_proba_one(&self, x: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        self.check_input(x)?;
        let n = self.trees.len() as f64;
        Ok(self.votes(x).into_iter().map(|v| v as f64 / n).collect())
    }
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed ^ (tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn records(rows: &[FeatureVector], width: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), width), |(r, c)| {
        if rows[r].is_set(c) { 1.0 } else { 0.0 }
    })
}

#[cfg(test)]
mod tests {
    use super::{ForestConfig, RandomForest};
    use crate::classifier::{Classifier, ClassifierError};
    use crate::dataset::{FeatureVector, Outcome};

    fn row(bits: &[u8]) -> FeatureVector {
        let mut v = FeatureVector::zeros(bits.len());
        for (idx, bit) in bits.iter().enumerate() {
            if *bit == 1 {
                v.set(idx);
            }
        }
        v
    }

    // Columns: home:A, home:B, away:C, away:D. A always wins at home, B always loses.
    fn separable() -> (Vec<FeatureVector>, Vec<Outcome>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..3 {
            x.push(row(&[1, 0, 1, 0]));
            y.push(Outcome::HomeWin);
            x.push(row(&[1, 0, 0, 1]));
            y.push(Outcome::HomeWin);
            x.push(row(&[0, 1, 1, 0]));
            y.push(Outcome::AwayWin);
            x.push(row(&[0, 1, 0, 1]));
            y.push(Outcome::AwayWin);
        }
        (x, y)
    }

    #[test]
    fn unfitted_forest_refuses_to_predict() {
        let forest = RandomForest::with_seed(1);
        assert_eq!(
            forest.predict_one(&row(&[1, 0])),
            Err(ClassifierError::NotFitted)
        );
    }

    #[test]
    fn empty_or_ragged_input_is_rejected() {
        let mut forest = RandomForest::with_seed(1);
        assert_eq!(forest.fit(&[], &[]), Err(ClassifierError::EmptyTrainingSet));
        assert_eq!(
            forest.fit(&[row(&[1, 0])], &[Outcome::Draw, Outcome::Draw]),
            Err(ClassifierError::LengthMismatch {
                features: 1,
                labels: 2
            })
        );
        assert!(matches!(
            forest.fit(&[row(&[1, 0]), row(&[1])], &[Outcome::Draw, Outcome::Draw]),
            Err(ClassifierError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn classes_are_observed_labels_in_outcome_order() {
        let (x, y) = separable();
        let mut forest = RandomForest::with_seed(42);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.classes(), &[Outcome::HomeWin, Outcome::AwayWin]);
    }

    #[test]
    fn learns_home_team_pattern() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 50,
            ..ForestConfig::default()
        });
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.predict_one(&row(&[1, 0, 1, 0])).unwrap(), Outcome::HomeWin);
        assert_eq!(forest.predict_one(&row(&[0, 1, 0, 1])).unwrap(), Outcome::AwayWin);

        let proba = forest.predict_proba_one(&row(&[1, 0, 0, 1])).unwrap();
        assert_eq!(proba.len(), 2);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[0] > 0.5);
    }

    #[test]
    fn single_class_training_set_votes_unanimously() {
        let x = vec![row(&[1, 0]), row(&[0, 1]), row(&[1, 0])];
        let y = vec![Outcome::Draw; 3];
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 5,
            ..ForestConfig::default()
        });
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.classes(), &[Outcome::Draw]);
        assert_eq!(forest.predict_proba_one(&row(&[0, 1])).unwrap(), vec![1.0]);
    }

    #[test]
    fn same_seed_same_probabilities() {
        let (x, y) = separable();
        let mut a = RandomForest::with_seed(7);
        let mut b = RandomForest::with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let unseen = row(&[0, 0, 1, 0]);
        assert_eq!(
            a.predict_proba_one(&unseen).unwrap(),
            b.predict_proba_one(&unseen).unwrap()
        );
    }

    #[test]
    fn width_must_match_training() {
        let (x, y) = separable();
        let mut forest = RandomForest::with_seed(3);
        forest.fit(&x, &y).unwrap();
        assert_eq!(
            forest.predict_proba_one(&row(&[1, 0])),
            Err(ClassifierError::WidthMismatch {
                expected: 4,
                actual: 2
            })
        );
    }
}
