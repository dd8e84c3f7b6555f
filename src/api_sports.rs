use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::http_cache::{ResponseCache, default_cache_path};
use crate::http_client::http_client;
use crate::pipeline::FixtureSource;

const API_KEY_HEADER: &str = "x-apisports-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: u32,
    pub name: String,
    pub country: Option<String>,
}

/// API-Football v3 client. Owns its HTTP client and response cache; the
/// configuration it was built with is the only source of key and base URL.
pub struct ApiSportsClient {
    config: ApiConfig,
    client: Client,
    cache: ResponseCache,
}

impl ApiSportsClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let cache = ResponseCache::open(default_cache_path(), config.cache_ttl);
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: ApiConfig, cache: ResponseCache) -> Result<Self> {
        let client = http_client(&config)?;
        Self::with_client(config, client, cache)
    }

    pub fn with_client(config: ApiConfig, client: Client, cache: ResponseCache) -> Result<Self> {
        config.require_api_key()?;
        Ok(Self {
            config,
            client,
            cache,
        })
    }

    pub fn leagues(&self) -> Result<Vec<League>> {
        let body = self.get("/leagues").context("leagues request failed")?;
        parse_leagues_json(&body)
    }

    pub fn teams(&self, league_id: u32, season: u16) -> Result<Vec<String>> {
        let body = self
            .get(&format!("/teams?league={league_id}&season={season}"))
            .context("teams request failed")?;
        parse_teams_json(&body)
    }

    pub fn fixtures_payload(&self, league_id: u32, season: u16) -> Result<Value> {
        let body = self
            .get(&format!("/fixtures?league={league_id}&season={season}"))
            .context("fixtures request failed")?;
        parse_payload(&body)
    }

    fn get(&self, path: &str) -> Result<String> {
        let key = self.config.require_api_key()?;
        let url = format!("{}{path}", self.config.base_url);
        debug!(%url, "api-sports request");
        // Error payloads arrive as HTTP 200 and must not be cached.
        self.cache.fetch_json_validated(
            &self.client,
            &url,
            &[(API_KEY_HEADER, key)],
            |body| parse_payload(body).map(|_| ()),
        )
    }
}

impl FixtureSource for ApiSportsClient {
    fn fixtures(&self, league_id: u32, season: u16) -> Result<Value> {
        let payload = self.fixtures_payload(league_id, season)?;
        let count = payload
            .get("response")
            .and_then(|v| v.as_array())
            .map_or(0, |a| a.len());
        info!(league_id, season, count, "fetched fixtures");
        Ok(payload)
    }
}

pub fn parse_leagues_json(raw: &str) -> Result<Vec<League>> {
    let v = parse_payload(raw)?;
    let Some(arr) = v.get("response").and_then(|x| x.as_array()) else {
        return Ok(Vec::new());
    };
    Ok(arr.iter().filter_map(parse_league).collect())
}

pub fn parse_teams_json(raw: &str) -> Result<Vec<String>> {
    let v = parse_payload(raw)?;
    let Some(arr) = v.get("response").and_then(|x| x.as_array()) else {
        return Ok(Vec::new());
    };
    Ok(arr
        .iter()
        .filter_map(|item| item.get("team")?.get("name")?.as_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect())
}

/// Parses a response body and surfaces the `errors` field API-Football uses
/// for bad keys and quota exhaustion (those still come back as HTTP 200).
pub fn parse_payload(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Null);
    }
    let v: Value = serde_json::from_str(trimmed).context("invalid api-sports json")?;
    check_api_errors(&v)?;
    Ok(v)
}

fn check_api_errors(v: &Value) -> Result<()> {
    let Some(errors) = v.get("errors") else {
        return Ok(());
    };
    let messages: Vec<String> = match errors {
        Value::Object(map) => map
            .iter()
            .map(|(k, msg)| format!("{k}: {}", msg.as_str().unwrap_or_default()))
            .collect(),
        Value::Array(arr) => arr
            .iter()
            .map(|msg| msg.as_str().map_or_else(|| msg.to_string(), |s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    if messages.is_empty() {
        return Ok(());
    }
    Err(anyhow!("api-sports error: {}", messages.join("; ")))
}

fn parse_league(item: &Value) -> Option<League> {
    let league = item.get("league")?;
    let id = u32::try_from(league.get("id")?.as_u64()?).ok()?;
    let name = league.get("name")?.as_str()?.to_string();
    let country = item
        .get("country")
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .map(|s| s.to_string());
    Some(League { id, name, country })
}
