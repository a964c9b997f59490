//! Song catalog: songs, their jacket hashes and playable patterns.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::phash::PHash;

/// Chart difficulty tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Hard,
    Over,
    Plus,
    /// Could not be determined from the screenshot
    Unknown,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Hard => "HARD",
            Difficulty::Over => "OVER",
            Difficulty::Plus => "PLUS",
            Difficulty::Unknown => "UNKNOWN",
        }
    }

    /// Parses a catalog difficulty name. `Unknown` is never produced.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "EASY" => Some(Difficulty::Easy),
            "HARD" => Some(Difficulty::Hard),
            "OVER" => Some(Difficulty::Over),
            "PLUS" => Some(Difficulty::Plus),
            _ => None,
        }
    }

    pub fn is_plus(&self) -> bool {
        matches!(self, Difficulty::Plus)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One playable chart of a song.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// 4 or 6
    pub line: u8,
    pub difficulty: Difficulty,
    pub level: u32,
    pub designer: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}L {} Lv.{} by {}",
            self.line, self.difficulty, self.level, self.designer
        )
    }
}

#[derive(Clone, Debug)]
pub struct Song {
    pub id: u32,
    pub title: String,
    pub artist: String,
    pub bpm: String,
    pub dlc: String,
    /// Jacket shown for non-PLUS charts
    pub jacket_hash: Option<PHash>,
    /// Jacket shown for PLUS charts
    pub plus_jacket_hash: Option<PHash>,
    pub patterns: Vec<Pattern>,
}

impl Song {
    /// Levels registered for a (line, difficulty) chart, in catalog order.
    pub fn available_levels(&self, line: u8, difficulty: Difficulty) -> Vec<u32> {
        self.patterns
            .iter()
            .filter(|p| p.line == line && p.difficulty == difficulty)
            .map(|p| p.level)
            .collect()
    }
}

/// Song record as served by the catalog endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SongFeed {
    #[serde(rename = "songID")]
    pub song_id: u32,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(rename = "BPM", default)]
    pub bpm: Value,
    #[serde(rename = "DLC", default)]
    pub dlc: Value,
    #[serde(rename = "pHash", default)]
    pub phash: Option<String>,
    #[serde(rename = "plusPHash", default)]
    pub plus_phash: Option<String>,
}

/// Pattern record as served by the catalog endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternFeed {
    #[serde(rename = "songID")]
    pub song_id: u32,
    pub line: u8,
    pub difficulty: String,
    pub level: u32,
    #[serde(default)]
    pub designer: Option<String>,
}

/// Songs and patterns bundled in one document (offline catalog file).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogFeed {
    #[serde(default)]
    pub songs: Vec<SongFeed>,
    #[serde(default)]
    pub patterns: Vec<PatternFeed>,
}

/// Renders a loosely typed feed value (string or number) as text.
fn feed_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_feed_hash(song_id: u32, kind: &str, raw: Option<&str>) -> Option<PHash> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match PHash::from_hex(raw) {
        Ok(hash) => Some(hash),
        Err(e) => {
            log::warn!("Song {}: dropping {} hash: {}", song_id, kind, e);
            None
        }
    }
}

/// Immutable set of songs, shared with the matcher via `Arc<Song>`.
#[derive(Clone, Debug, Default)]
pub struct SongCatalog {
    songs: Vec<Arc<Song>>,
}

impl SongCatalog {
    /// Builds the catalog from the two feed documents.
    ///
    /// Patterns referencing unknown songs or unknown difficulties are dropped,
    /// as are unparseable jacket hashes. Later duplicates of a song id replace
    /// earlier ones.
    pub fn from_feed(songs: Vec<SongFeed>, patterns: Vec<PatternFeed>) -> Self {
        let mut built: Vec<Song> = Vec::with_capacity(songs.len());
        let mut by_id: HashMap<u32, usize> = HashMap::new();

        for feed in songs {
            let song = Song {
                id: feed.song_id,
                title: feed.title,
                artist: feed.artist.trim().to_string(),
                bpm: feed_text(&feed.bpm),
                dlc: feed_text(&feed.dlc),
                jacket_hash: parse_feed_hash(feed.song_id, "jacket", feed.phash.as_deref()),
                plus_jacket_hash: parse_feed_hash(
                    feed.song_id,
                    "plus jacket",
                    feed.plus_phash.as_deref(),
                ),
                patterns: Vec::new(),
            };
            match by_id.get(&song.id) {
                Some(&idx) => built[idx] = song,
                None => {
                    by_id.insert(song.id, built.len());
                    built.push(song);
                }
            }
        }

        let mut dropped = 0usize;
        for feed in patterns {
            let Some(&idx) = by_id.get(&feed.song_id) else {
                dropped += 1;
                continue;
            };
            let Some(difficulty) = Difficulty::parse(&feed.difficulty) else {
                log::warn!(
                    "Song {}: dropping pattern with difficulty '{}'",
                    feed.song_id,
                    feed.difficulty
                );
                continue;
            };
            built[idx].patterns.push(Pattern {
                line: feed.line,
                difficulty,
                level: feed.level,
                designer: feed.designer.unwrap_or_default(),
            });
        }
        if dropped > 0 {
            log::debug!("Dropped {} patterns of unknown songs", dropped);
        }

        log::info!("Catalog built: {} songs", built.len());
        Self {
            songs: built.into_iter().map(Arc::new).collect(),
        }
    }

    /// Loads an offline catalog file with `songs` and `patterns` arrays.
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let feed: CatalogFeed = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        Ok(Self::from_feed(feed.songs, feed.patterns))
    }

    pub fn songs(&self) -> &[Arc<Song>] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
