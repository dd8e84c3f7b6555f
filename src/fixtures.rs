use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A finished match with a known final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    #[serde(default)]
    pub date: Option<String>,
}

impl FixtureRecord {
    pub fn new(home_team: &str, away_team: &str, home_goals: u32, away_goals: u32) -> Self {
        Self {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_goals,
            away_goals,
            date: None,
        }
    }

    pub fn with_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }
}

/// Converts an API-Football `/fixtures` payload into records.
///
/// A payload without a `response` array yields no records. Entries that are
/// unplayed (null goals) or missing a team name are dropped.
pub fn normalize(payload: &Value) -> Vec<FixtureRecord> {
    let Some(arr) = payload.get("response").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let out: Vec<FixtureRecord> = arr.iter().filter_map(parse_fixture_record).collect();
    debug!(
        raw = arr.len(),
        kept = out.len(),
        dropped = arr.len() - out.len(),
        "normalized fixtures"
    );
    out
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<FixtureRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let v: Value = serde_json::from_str(trimmed).context("invalid fixtures json")?;
    Ok(normalize(&v))
}

fn parse_fixture_record(v: &Value) -> Option<FixtureRecord> {
    let teams = v.get("teams")?;
    let home_team = team_name(teams.get("home")?)?;
    let away_team = team_name(teams.get("away")?)?;

    let goals = v.get("goals")?;
    let home_goals = u32::try_from(goals.get("home")?.as_u64()?).ok()?;
    let away_goals = u32::try_from(goals.get("away")?.as_u64()?).ok()?;

    let date = v
        .get("fixture")
        .and_then(|f| f.get("date"))
        .and_then(|d| d.as_str())
        .map(|s| s.to_string());

    Some(FixtureRecord {
        home_team,
        away_team,
        home_goals,
        away_goals,
        date,
    })
}

fn team_name(team: &Value) -> Option<String> {
    let name = team.get("name")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
