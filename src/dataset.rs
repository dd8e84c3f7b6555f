use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::fixtures::FixtureRecord;

/// Final result of a fixture, from the home side's point of view.
///
/// The declaration order is the class order reported by classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::HomeWin, Outcome::Draw, Outcome::AwayWin];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::HomeWin => "HomeWin",
            Outcome::Draw => "Draw",
            Outcome::AwayWin => "AwayWin",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::HomeWin
    } else if home_goals < away_goals {
        Outcome::AwayWin
    } else {
        Outcome::Draw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

/// Ordered one-hot vocabulary: all `home:` columns, then all `away:` columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSchema {
    home: Vec<String>,
    away: Vec<String>,
    home_index: HashMap<String, usize>,
    away_index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.home.len() + self.away.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn home_range(&self) -> Range<usize> {
        0..self.home.len()
    }

    pub fn away_range(&self) -> Range<usize> {
        self.home.len()..self.len()
    }

    /// Column position of `home:<team>`, if the team was seen at home.
    pub fn home_column(&self, team: &str) -> Option<usize> {
        self.home_index.get(team).copied()
    }

    /// Column position of `away:<team>`, if the team was seen away.
    pub fn away_column(&self, team: &str) -> Option<usize> {
        self.away_index
            .get(team)
            .map(|idx| self.home.len() + idx)
    }

    pub fn column(&self, side: Side, team: &str) -> Option<usize> {
        match side {
            Side::Home => self.home_column(team),
            Side::Away => self.away_column(team),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        let home = self
            .home
            .iter()
            .map(|t| format!("{}:{t}", Side::Home.prefix()));
        let away = self
            .away
            .iter()
            .map(|t| format!("{}:{t}", Side::Away.prefix()));
        home.chain(away).collect()
    }

    fn observe(&mut self, side: Side, team: &str) {
        let (names, index) = match side {
            Side::Home => (&mut self.home, &mut self.home_index),
            Side::Away => (&mut self.away, &mut self.away_index),
        };
        if !index.contains_key(team) {
            index.insert(team.to_string(), names.len());
            names.push(team.to_string());
        }
    }
}

/// Row aligned with a [`FeatureSchema`]; every entry is 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Marks column `idx`. Returns `false` when `idx` is outside the vector.
    pub fn set(&mut self, idx: usize) -> bool {
        match self.0.get_mut(idx) {
            Some(v) => {
                *v = 1;
                true
            }
            None => false,
        }
    }

    pub fn is_set(&self, idx: usize) -> bool {
        self.0.get(idx).is_some_and(|v| *v == 1)
    }

    pub fn values(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ones_in(&self, range: Range<usize>) -> usize {
        self.0
            .get(range)
            .map_or(0, |cols| cols.iter().filter(|v| **v == 1).count())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub schema: FeatureSchema,
    pub features: Vec<FeatureVector>,
    pub labels: Vec<Outcome>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// No rows means there is nothing to fit on.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub fn build(fixtures: &[FixtureRecord]) -> TrainingSet {
    let mut schema = FeatureSchema::default();
    for f in fixtures {
        schema.observe(Side::Home, &f.home_team);
    }
    for f in fixtures {
        schema.observe(Side::Away, &f.away_team);
    }

    let mut features = Vec::with_capacity(fixtures.len());
    let mut labels = Vec::with_capacity(fixtures.len());
    for f in fixtures {
        let mut row = FeatureVector::zeros(schema.len());
        if let Some(idx) = schema.home_column(&f.home_team) {
            row.set(idx);
        }
        if let Some(idx) = schema.away_column(&f.away_team) {
            row.set(idx);
        }
        features.push(row);
        labels.push(classify_outcome(f.home_goals, f.away_goals));
    }

    TrainingSet {
        schema,
        features,
        labels,
    }
}
