use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::{ArchiveEntry, ArchiveStore, ArchiveSync, SyncRecord};
use crate::catalog::{PatternFeed, SongCatalog, SongFeed};
use crate::config::ApiConfig;
use crate::paths::get_cache_dir;

const API_KEY_HEADER: &str = "X-API-Key";
const CACHE_FILE: &str = "db.json";

/// Catalog feed documents cached on disk with their Last-Modified stamps.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogCache {
    #[serde(rename = "Songs-Last-Modified", default)]
    pub songs_last_modified: Option<String>,
    #[serde(rename = "Patterns-Last-Modified", default)]
    pub patterns_last_modified: Option<String>,
    #[serde(default)]
    pub songs: Vec<SongFeed>,
    #[serde(default)]
    pub patterns: Vec<PatternFeed>,
}

impl CatalogCache {
    /// Loads the cache, or an empty one if it is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
        {
            Ok(cache) => cache,
            Err(e) => {
                log::warn!("Ignoring catalog cache {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn to_catalog(&self) -> SongCatalog {
        SongCatalog::from_feed(self.songs.clone(), self.patterns.clone())
    }
}

/// A fresh feed document, or None when the server answered 304.
struct Fetched<T> {
    body: Option<T>,
    last_modified: Option<String>,
}

/// Latest released client version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ClientVersion {
    /// Parses "major.minor.patch", with or without a leading "v".
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().trim_start_matches('v').split('.');
        let version = Self {
            major: parts.next()?.parse().ok()?,
            minor: parts.next()?.parse().ok()?,
            patch: parts.next()?.parse().ok()?,
        };
        parts.next().is_none().then_some(version)
    }

    /// Version of this build.
    pub fn current() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Self {
            major: 0,
            minor: 0,
            patch: 0,
        })
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Blocking client for the PLATiNA::ARCHiVE web service.
pub struct ArchiveClient {
    http: Client,
    base_url: String,
    cache_path: PathBuf,
    api_key: Option<String>,
}

impl ArchiveClient {
    pub fn new(config: &ApiConfig, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let cache_dir = config.cache_dir.clone().unwrap_or_else(get_cache_dir);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache_path: cache_dir.join(CACHE_FILE),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No archive API key configured"))
    }

    /// Player name, the part of the API key before "::".
    pub fn decoder_name(&self) -> Option<&str> {
        self.api_key.as_deref().and_then(|k| k.split("::").next())
    }

    fn fetch_if_modified<T: DeserializeOwned>(
        &self,
        name: &str,
        since: Option<&str>,
    ) -> Result<Fetched<T>> {
        let url = self.endpoint(name);
        let mut request = self.http.get(&url);
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }
        let response = request
            .send()
            .with_context(|| format!("Failed to request {}", url))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            log::debug!("{}: not modified", name);
            return Ok(Fetched {
                body: None,
                last_modified: since.map(str::to_string),
            });
        }

        let response = response
            .error_for_status()
            .with_context(|| format!("{} returned an error", url))?;
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .json()
            .with_context(|| format!("Failed to parse {}", url))?;
        Ok(Fetched {
            body: Some(body),
            last_modified,
        })
    }

    /// Fetches songs and patterns, reusing the on-disk cache for documents
    /// the server reports as unchanged.
    pub fn fetch_catalog(&self) -> Result<SongCatalog> {
        let mut cache = CatalogCache::load(&self.cache_path);
        let mut changed = false;

        let songs: Fetched<Vec<SongFeed>> =
            self.fetch_if_modified("platina_songs", cache.songs_last_modified.as_deref())?;
        if let Some(body) = songs.body {
            cache.songs = body;
            cache.songs_last_modified = songs.last_modified;
            changed = true;
        }

        let patterns: Fetched<Vec<PatternFeed>> =
            self.fetch_if_modified("platina_patterns", cache.patterns_last_modified.as_deref())?;
        if let Some(body) = patterns.body {
            cache.patterns = body;
            cache.patterns_last_modified = patterns.last_modified;
            changed = true;
        }

        if changed {
            if let Err(e) = cache.save(&self.cache_path) {
                log::warn!("Failed to update catalog cache: {:#}", e);
            }
        }

        let catalog = cache.to_catalog();
        log::info!("Loaded {} songs", catalog.len());
        Ok(catalog)
    }

    /// Fetches the player's best records.
    pub fn fetch_archive(&self) -> Result<ArchiveStore> {
        let url = self.endpoint("get_archive");
        let entries: Vec<ArchiveEntry> = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .and_then(Response::error_for_status)
            .with_context(|| format!("Failed to fetch archive from {}", url))?
            .json()
            .context("Failed to parse archive")?;

        let store = ArchiveStore::from_entries(entries);
        log::info!("Loaded {} archive records", store.len());
        Ok(store)
    }

    pub fn fetch_latest_client_version(&self) -> Result<ClientVersion> {
        let url = self.endpoint("client_version");
        self.http
            .get(&url)
            .send()
            .and_then(Response::error_for_status)
            .with_context(|| format!("Failed to request {}", url))?
            .json()
            .context("Failed to parse client version")
    }
}

impl ArchiveSync for ArchiveClient {
    fn push(&self, record: &SyncRecord) -> Result<()> {
        let url = self.endpoint("update_archive");
        self.http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key()?)
            .json(record)
            .send()
            .and_then(Response::error_for_status)
            .with_context(|| format!("Failed to update archive at {}", url))?;
        log::debug!("Synced record for song {}", record.song_id);
        Ok(())
    }
}
