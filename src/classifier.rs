use thiserror::Error;

use crate::dataset::{FeatureVector, Outcome};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier has not been fitted")]
    NotFitted,

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("expected {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("model backend failed: {0}")]
    Backend(String),
}

/// Fit/predict contract the pipeline consumes. Probabilities returned by
/// [`Classifier::predict_proba_one`] are aligned with [`Classifier::classes`].
pub trait Classifier {
    fn fit(
        &mut self,
        features: &[FeatureVector],
        labels: &[Outcome],
    ) -> Result<(), ClassifierError>;

    fn classes(&self) -> &[Outcome];

    fn predict_one(&self, x: &FeatureVector) -> Result<Outcome, ClassifierError>;

    fn predict_proba_one(&self, x: &FeatureVector) -> Result<Vec<f64>, ClassifierError>;
}

pub(crate) fn check_training_input(
    features: &[FeatureVector],
    labels: &[Outcome],
) -> Result<usize, ClassifierError> {
    if features.is_empty() || labels.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    let width = features[0].len();
    if let Some(bad) = features.iter().find(|row| row.len() != width) {
        return Err(ClassifierError::WidthMismatch {
            expected: width,
            actual: bad.len(),
        });
    }
    Ok(width)
}
