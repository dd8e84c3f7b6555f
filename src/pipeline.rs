use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ClassifierError};
use crate::dataset::{self, FeatureSchema, TrainingSet};
use crate::fixtures::{FixtureRecord, normalize};
use crate::predictor::{self, PredictError, Prediction};

/// Where raw fixture payloads come from. Implemented by the API-Football
/// client and by in-memory sources in tests.
pub trait FixtureSource {
    fn fixtures(&self, league_id: u32, season: u16) -> Result<Value>;
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("home and away team are both {0:?}")]
    SameTeam(String),

    #[error("classifier failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("inconsistent prediction: {0}")]
    Predict(#[from] PredictError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub league_id: u32,
    pub season: u16,
    pub home_team: String,
    pub away_team: String,
}

impl PredictionRequest {
    pub fn new(league_id: u32, season: u16, home_team: &str, away_team: &str) -> Self {
        Self {
            league_id,
            season,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.home_team == self.away_team {
            return Err(PipelineError::SameTeam(self.home_team.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub prediction: Prediction,
    pub training: TrainingSet,
    pub fixtures: Vec<FixtureRecord>,
    pub home_seen: bool,
    pub away_seen: bool,
}

impl PredictionReport {
    pub fn schema(&self) -> &FeatureSchema {
        &self.training.schema
    }
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Nothing to train on for this league and season.
    InsufficientData,
    Prediction(Box<PredictionReport>),
}

/// Last normalized fixture set per (league, season), owned by the caller.
#[derive(Debug, Default)]
pub struct FixtureSetCache {
    entries: HashMap<(u32, u16), Vec<FixtureRecord>>,
}

impl FixtureSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Empty fixture sets are not remembered, so a later call fetches again.
    pub fn get_or_fetch(
        &mut self,
        source: &dyn FixtureSource,
        league_id: u32,
        season: u16,
    ) -> Result<Vec<FixtureRecord>> {
        if let Some(hit) = self.entries.get(&(league_id, season)) {
            debug!(league_id, season, "fixture set cache hit");
            return Ok(hit.clone());
        }
        let fixtures = fetch_fixtures(source, league_id, season)?;
        if !fixtures.is_empty() {
            self.entries.insert((league_id, season), fixtures.clone());
        }
        Ok(fixtures)
    }
}

pub fn fetch_fixtures(
    source: &dyn FixtureSource,
    league_id: u32,
    season: u16,
) -> Result<Vec<FixtureRecord>> {
    let payload = source
        .fixtures(league_id, season)
        .with_context(|| format!("fetch fixtures league={league_id} season={season}"))?;
    Ok(normalize(&payload))
}

/// Fetch, train and predict for one request. Nothing is kept afterwards.
pub fn run(
    source: &dyn FixtureSource,
    classifier: &mut dyn Classifier,
    request: &PredictionRequest,
) -> Result<PipelineOutcome> {
    request.validate()?;
    let fixtures = fetch_fixtures(source, request.league_id, request.season)?;
    predict_from_fixtures(fixtures, classifier, request)
}

pub fn run_cached(
    cache: &mut FixtureSetCache,
    source: &dyn FixtureSource,
    classifier: &mut dyn Classifier,
    request: &PredictionRequest,
) -> Result<PipelineOutcome> {
    request.validate()?;
    let fixtures = cache.get_or_fetch(source, request.league_id, request.season)?;
    predict_from_fixtures(fixtures, classifier, request)
}

pub fn predict_from_fixtures(
    fixtures: Vec<FixtureRecord>,
    classifier: &mut dyn Classifier,
    request: &PredictionRequest,
) -> Result<PipelineOutcome> {
    request.validate()?;
    let training = dataset::build(&fixtures);
    if training.is_empty() {
        warn!(
            league_id = request.league_id,
            season = request.season,
            "no finished fixtures, skipping fit"
        );
        return Ok(PipelineOutcome::InsufficientData);
    }
    info!(
        rows = training.len(),
        columns = training.schema.len(),
        "training set built"
    );

    let started = Instant::now();
    classifier
        .fit(&training.features, &training.labels)
        .map_err(PipelineError::from)?;
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "classifier fitted");

    let schema = &training.schema;
    let home_seen = schema.home_column(&request.home_team).is_some();
    let away_seen = schema.away_column(&request.away_team).is_some();
    if !home_seen || !away_seen {
        debug!(home_seen, away_seen, "team unseen in training, using zero features");
    }

    let x = predictor::make_inference_vector(schema, &request.home_team, &request.away_team);
    let predicted = classifier.predict_one(&x).map_err(PipelineError::from)?;
    let proba = classifier
        .predict_proba_one(&x)
        .map_err(PipelineError::from)?;
    let prediction = predictor::interpret(
        classifier.classes(),
        &proba,
        predicted,
        &request.home_team,
        &request.away_team,
    )
    .map_err(PipelineError::from)?;

    Ok(PipelineOutcome::Prediction(Box::new(PredictionReport {
        prediction,
        training,
        fixtures,
        home_seen,
        away_seen,
    })))
}
