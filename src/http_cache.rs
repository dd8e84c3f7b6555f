use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "maxfoot";
const CACHE_FILE: &str = "http_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// JSON response cache owned by one API client. Entries younger than `ttl`
/// are served without a request; older ones are revalidated with
/// ETag/Last-Modified when the server supplied them.
#[derive(Debug)]
pub struct ResponseCache {
    path: Option<PathBuf>,
    ttl: Duration,
    state: Mutex<HttpCacheFile>,
}

impl ResponseCache {
    pub fn open(path: Option<PathBuf>, ttl: Duration) -> Self {
        let state = path.as_deref().map(load_cache_file).unwrap_or_default();
        Self {
            path,
            ttl,
            state: Mutex::new(state),
        }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::open(None, ttl)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetch_json(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<String> {
        self.fetch_json_validated(client, url, extra_headers, |_| Ok(()))
    }

    /// Like [`ResponseCache::fetch_json`], but a 200 body is only stored once
    /// `validate` accepts it. A rejected body is returned as the error and
    /// the next call goes back to the server.
    pub fn fetch_json_validated(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
        validate: impl Fn(&str) -> Result<()>,
    ) -> Result<String> {
        let now = system_time_to_secs(SystemTime::now()).unwrap_or_default();
        let mut cached_entry = self.lookup(url)?;
        if cached_entry
            .as_ref()
            .is_some_and(|entry| validate(&entry.body).is_err())
        {
            debug!(url, "dropping rejected cache entry");
            self.remove(url)?;
            cached_entry = None;
        }
        if let Some(entry) = cached_entry.as_ref() {
            if is_fresh(entry, now, self.ttl) {
                debug!(url, "serving cached response");
                return Ok(entry.body.clone());
            }
        }

        let mut req = client.get(url).header(USER_AGENT, "maxfoot/0.1");
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if let Some(entry) = cached_entry.as_ref() {
            if let Some(etag) = entry.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let headers = resp.headers().clone();
        if status == StatusCode::NOT_MODIFIED {
            if let Some(mut entry) = cached_entry {
                debug!(url, "response not modified");
                entry.fetched_at = now;
                let body = entry.body.clone();
                self.store(url, entry)?;
                return Ok(body);
            }
            return Err(anyhow!("received 304 without cache body"));
        }

        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, body));
        }
        validate(&body)?;

        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        self.store(
            url,
            CacheEntry {
                body: body.clone(),
                etag,
                last_modified,
                fetched_at: now,
            },
        )?;
        Ok(body)
    }

    fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        let guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        Ok(guard.entries.get(key).cloned())
    }

    fn store(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        guard.version = CACHE_VERSION;
        guard.entries.insert(key.to_string(), entry);
        self.persist(&guard);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        if guard.entries.remove(key).is_some() {
            self.persist(&guard);
        }
        Ok(())
    }

    fn persist(&self, cache: &HttpCacheFile) {
        if let Some(path) = self.path.as_deref() {
            // A failed write only costs a refetch next run.
            if let Err(err) = save_cache_file(path, cache) {
                debug!(error = %err, "http cache not persisted");
            }
        }
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn is_fresh(entry: &CacheEntry, now: u64, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return false;
    }
    now.saturating_sub(entry.fetched_at) < ttl.as_secs()
}

fn load_cache_file(path: &Path) -> HttpCacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &HttpCacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, path).context("swap http cache")?;
    Ok(())
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
