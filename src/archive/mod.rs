//! The player's archive of best records.
//!
//! This module provides:
//! - Best records keyed by chart, as served by the archive feed
//! - The reconciler that decides whether a new result replaces a record
//! - The sync record pushed to the archive service

pub mod reconciler;

pub use reconciler::{ArchiveReconciler, ArchiveSync, Reconciliation, SyncRecord};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::analysis::AnalysisResult;
use crate::catalog::Difficulty;

/// Identifies one chart of one song.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveKey {
    pub song_id: u32,
    pub line: u8,
    pub difficulty: Difficulty,
    pub level: u32,
}

impl ArchiveKey {
    /// Key of the chart a result was played on.
    ///
    /// None when the difficulty or level could not be determined, since such
    /// a result cannot be attributed to a chart.
    pub fn of(result: &AnalysisResult) -> Option<Self> {
        if result.difficulty == Difficulty::Unknown || result.level == 0 {
            return None;
        }
        Some(Self {
            song_id: result.song.id,
            line: result.line,
            difficulty: result.difficulty,
            level: result.level,
        })
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.song_id, self.line, self.difficulty, self.level
        )
    }
}

/// Best play recorded for a chart.
///
/// Only `apply` changes a record once it exists.
#[derive(Clone, Debug, PartialEq)]
pub struct BestRecord {
    accuracy: f64,
    score: u64,
    rating: f64,
    decoded_at: DateTime<Utc>,
    is_full_combo: bool,
    is_max_rating: bool,
}

impl BestRecord {
    /// Zero record standing in for a chart that was never played.
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            accuracy: 0.0,
            score: 0,
            rating: 0.0,
            decoded_at: now,
            is_full_combo: false,
            is_max_rating: false,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn decoded_at(&self) -> DateTime<Utc> {
        self.decoded_at
    }

    pub fn is_full_combo(&self) -> bool {
        self.is_full_combo
    }

    pub fn is_max_rating(&self) -> bool {
        self.is_max_rating
    }

    pub fn is_perfect(&self) -> bool {
        self.accuracy == 100.0
    }

    /// Replaces this record with a better result.
    pub(crate) fn apply(&mut self, result: &AnalysisResult, now: DateTime<Utc>) {
        self.accuracy = result.accuracy;
        self.score = result.score;
        self.rating = result.rating;
        self.decoded_at = now;
        self.is_full_combo = result.is_full_combo;
        self.is_max_rating = result.is_max_rating;
    }
}

/// One record of the archive feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub song_id: u32,
    pub line: u8,
    pub difficulty: Difficulty,
    pub level: u32,
    pub judge: f64,
    pub score: u64,
    pub patch: f64,
    pub decoded_at: String,
    #[serde(default)]
    pub is_full_combo: bool,
    #[serde(default)]
    pub is_max_patch: bool,
}

/// Parses a feed timestamp. Timestamps without an offset are taken as UTC.
fn parse_decoded_at(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// All best records of one player.
#[derive(Clone, Debug, Default)]
pub struct ArchiveStore {
    records: HashMap<ArchiveKey, BestRecord>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the store from feed entries. Later entries for the same chart
    /// replace earlier ones.
    pub fn from_entries(entries: Vec<ArchiveEntry>) -> Self {
        let mut records = HashMap::with_capacity(entries.len());
        for entry in entries {
            let decoded_at = parse_decoded_at(&entry.decoded_at).unwrap_or_else(|| {
                log::warn!(
                    "Archive entry for song {}: unreadable timestamp '{}'",
                    entry.song_id,
                    entry.decoded_at
                );
                DateTime::<Utc>::UNIX_EPOCH
            });
            let key = ArchiveKey {
                song_id: entry.song_id,
                line: entry.line,
                difficulty: entry.difficulty,
                level: entry.level,
            };
            records.insert(
                key,
                BestRecord {
                    accuracy: entry.judge,
                    score: entry.score,
                    rating: entry.patch,
                    decoded_at,
                    is_full_combo: entry.is_full_combo,
                    is_max_rating: entry.is_max_patch,
                },
            );
        }
        Self { records }
    }

    pub fn get(&self, key: &ArchiveKey) -> Option<&BestRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Applies a result to the chart's record, creating it if needed.
    /// Returns the updated record.
    pub(crate) fn apply(
        &mut self,
        key: ArchiveKey,
        result: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> BestRecord {
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| BestRecord::placeholder(now));
        record.apply(result, now);
        record.clone()
    }
}
