use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::dataset::Side;
use crate::fixtures::FixtureRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormResult {
    Win,
    Draw,
    Loss,
}

impl FormResult {
    pub fn letter(self) -> char {
        match self {
            FormResult::Win => 'W',
            FormResult::Draw => 'D',
            FormResult::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEntry {
    pub kickoff: NaiveDateTime,
    pub opponent: String,
    pub venue: Side,
    pub goals_for: u32,
    pub goals_against: u32,
    pub result: FormResult,
}

/// Latest `limit` results for `team`, newest first. Undated fixtures are skipped.
pub fn recent_form(fixtures: &[FixtureRecord], team: &str, limit: usize) -> Vec<FormEntry> {
    let mut entries: Vec<FormEntry> = fixtures
        .iter()
        .filter(|f| f.involves(team))
        .filter_map(|f| {
            let kickoff = parse_kickoff(f.date.as_deref()?)?;
            let (venue, opponent, goals_for, goals_against) = if f.home_team == team {
                (Side::Home, &f.away_team, f.home_goals, f.away_goals)
            } else {
                (Side::Away, &f.home_team, f.away_goals, f.home_goals)
            };
            let result = if goals_for > goals_against {
                FormResult::Win
            } else if goals_for < goals_against {
                FormResult::Loss
            } else {
                FormResult::Draw
            };
            Some(FormEntry {
                kickoff,
                opponent: opponent.clone(),
                venue,
                goals_for,
                goals_against,
                result,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.kickoff.cmp(&a.kickoff));
    entries.truncate(limit);
    entries
}

pub fn form_string(entries: &[FormEntry]) -> String {
    entries.iter().map(|e| e.result.letter()).collect()
}

fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
