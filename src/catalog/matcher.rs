//! Jacket-hash lookup.
//!
//! The catalog is small (hundreds of songs), so a linear scan over every
//! normal and PLUS jacket hash is fast enough and keeps ties observable.

use std::sync::Arc;

use super::model::{Song, SongCatalog};
use crate::analysis::AnalysisError;
use crate::phash::PHash;

/// Which jacket of a song matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JacketVariant {
    Normal,
    Plus,
}

#[derive(Clone, Debug)]
struct MatchEntry {
    hash: PHash,
    song: Arc<Song>,
    variant: JacketVariant,
}

/// Best catalog match for a jacket hash.
#[derive(Clone, Debug)]
pub struct SongMatch {
    pub song: Arc<Song>,
    pub distance: u32,
    pub variant: JacketVariant,
}

#[derive(Clone, Debug, Default)]
pub struct SongMatcher {
    entries: Vec<MatchEntry>,
}

impl SongMatcher {
    pub fn new(catalog: &SongCatalog) -> Self {
        let mut entries = Vec::new();
        for song in catalog.songs() {
            if let Some(hash) = song.jacket_hash {
                entries.push(MatchEntry {
                    hash,
                    song: Arc::clone(song),
                    variant: JacketVariant::Normal,
                });
            }
            if let Some(hash) = song.plus_jacket_hash {
                entries.push(MatchEntry {
                    hash,
                    song: Arc::clone(song),
                    variant: JacketVariant::Plus,
                });
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest entry, first in catalog order on ties. No threshold applied.
    pub fn best_match(&self, hash: PHash) -> Option<SongMatch> {
        self.entries
            .iter()
            .map(|e| (e, e.hash.distance(&hash)))
            .min_by_key(|(_, d)| *d)
            .map(|(e, distance)| SongMatch {
                song: Arc::clone(&e.song),
                distance,
                variant: e.variant,
            })
    }

    /// Identifies the song, accepting a match only when its distance is at
    /// most `max_distance`.
    ///
    /// Two different songs sharing the minimum distance are rejected as
    /// ambiguous. Both jackets of one song matching equally is not a tie.
    pub fn identify(&self, hash: PHash, max_distance: u32) -> Result<SongMatch, AnalysisError> {
        let best = self.best_match(hash).ok_or(AnalysisError::SongNotRecognized {
            best_distance: None,
        })?;

        if best.distance > max_distance {
            log::debug!(
                "Jacket {} closest to '{}' at distance {}",
                hash,
                best.song.title,
                best.distance
            );
            return Err(AnalysisError::SongNotRecognized {
                best_distance: Some(best.distance),
            });
        }

        let mut tied: Vec<&Arc<Song>> = Vec::new();
        for entry in &self.entries {
            if entry.hash.distance(&hash) == best.distance
                && !tied.iter().any(|s| s.id == entry.song.id)
            {
                tied.push(&entry.song);
            }
        }
        if tied.len() > 1 {
            return Err(AnalysisError::AmbiguousSong {
                distance: best.distance,
                titles: tied.iter().map(|s| s.title.clone()).collect(),
            });
        }

        Ok(best)
    }
}
