use serde::Serialize;
use thiserror::Error;

use crate::dataset::{FeatureSchema, FeatureVector, Outcome};

const SUM_TOLERANCE: f64 = 1e-6;
const ARGMAX_TOLERANCE: f64 = 1e-9;

pub const DRAW_DISPLAY: &str = "Draw";

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("{labels} class labels but {probabilities} probabilities")]
    LengthMismatch { labels: usize, probabilities: usize },

    #[error("probability {value} for {outcome} is outside [0, 1]")]
    OutOfRange { outcome: Outcome, value: f64 },

    #[error("probabilities sum to {sum}, expected 1")]
    NotNormalized { sum: f64 },

    #[error("predicted label {0} is not among the classifier classes")]
    UnknownLabel(Outcome),

    #[error(
        "classifier predicted {predicted} (p={predicted_prob:.6}) but {top} has p={top_prob:.6}"
    )]
    Inconsistent {
        predicted: Outcome,
        predicted_prob: f64,
        top: Outcome,
        top_prob: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub outcome: Outcome,
    pub display_name: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub outcome: Outcome,
    pub display_name: String,
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    pub fn probability_of(&self, outcome: Outcome) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.outcome == outcome)
            .map(|p| p.probability)
    }
}

/// One-hot row for a matchup. Teams the schema never saw leave their half
/// of the vector at zero.
pub fn make_inference_vector(
    schema: &FeatureSchema,
    home_team: &str,
    away_team: &str,
) -> FeatureVector {
    let mut row = FeatureVector::zeros(schema.len());
    if let Some(idx) = schema.home_column(home_team) {
        row.set(idx);
    }
    if let Some(idx) = schema.away_column(away_team) {
        row.set(idx);
    }
    row
}

pub fn display_name(outcome: Outcome, home_team: &str, away_team: &str) -> String {
    match outcome {
        Outcome::HomeWin => home_team.to_string(),
        Outcome::AwayWin => away_team.to_string(),
        Outcome::Draw => DRAW_DISPLAY.to_string(),
    }
}

/// Turns raw classifier output into a display-ready result.
///
/// `predicted` is the classifier's own top label; it is not recomputed here,
/// only checked against the largest entry of `probabilities`.
pub fn interpret(
    labels: &[Outcome],
    probabilities: &[f64],
    predicted: Outcome,
    home_team: &str,
    away_team: &str,
) -> Result<Prediction, PredictError> {
    if labels.len() != probabilities.len() || labels.is_empty() {
        return Err(PredictError::LengthMismatch {
            labels: labels.len(),
            probabilities: probabilities.len(),
        });
    }
    for (outcome, value) in labels.iter().zip(probabilities) {
        if !(0.0..=1.0).contains(value) {
            return Err(PredictError::OutOfRange {
                outcome: *outcome,
                value: *value,
            });
        }
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > SUM_TOLERANCE {
        return Err(PredictError::NotNormalized { sum });
    }

    let Some(predicted_idx) = labels.iter().position(|l| *l == predicted) else {
        return Err(PredictError::UnknownLabel(predicted));
    };
    let mut top_idx = 0usize;
    for (idx, p) in probabilities.iter().enumerate() {
        if *p > probabilities[top_idx] {
            top_idx = idx;
        }
    }
    let predicted_prob = probabilities[predicted_idx];
    let top_prob = probabilities[top_idx];
    if top_prob - predicted_prob > ARGMAX_TOLERANCE {
        return Err(PredictError::Inconsistent {
            predicted,
            predicted_prob,
            top: labels[top_idx],
            top_prob,
        });
    }

    let probabilities = labels
        .iter()
        .zip(probabilities)
        .map(|(outcome, p)| ClassProbability {
            outcome: *outcome,
            display_name: display_name(*outcome, home_team, away_team),
            probability: *p,
        })
        .collect();

    Ok(Prediction {
        outcome: predicted,
        display_name: display_name(predicted, home_team, away_team),
        probabilities,
    })
}
