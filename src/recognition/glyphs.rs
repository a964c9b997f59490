//! Known-value glyph tables, parsed once from configuration.

use anyhow::{Context, Result};

use crate::config::{GlyphTable, GlyphTables};
use crate::phash::PHash;

/// Which glyph table a field falls back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphSet {
    ResultLevel,
    Digits,
    SelectLevel,
    SelectRatingMajor,
    SelectRatingMinor,
    SelectAccuracyMinor,
}

/// Parsed glyph table: value/hash pairs and a strict distance limit.
#[derive(Clone, Debug, Default)]
pub struct KnownGlyphs {
    below: u32,
    entries: Vec<(u32, PHash)>,
}

impl KnownGlyphs {
    pub fn from_table(table: &GlyphTable) -> Result<Self> {
        let entries = table
            .entries
            .iter()
            .map(|g| {
                PHash::from_hex(&g.hash)
                    .map(|h| (g.value, h))
                    .with_context(|| format!("Glyph hash for value {}", g.value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            below: table.below,
            entries,
        })
    }

    /// Closest known value and its distance, first in table order on ties.
    pub fn nearest(&self, hash: PHash) -> Option<(u32, u32)> {
        self.entries
            .iter()
            .map(|(value, h)| (*value, h.distance(&hash)))
            .min_by_key(|(_, d)| *d)
    }

    /// Closest known value, only if strictly closer than the table limit.
    pub fn lookup(&self, hash: PHash) -> Option<(u32, u32)> {
        self.nearest(hash).filter(|(_, d)| *d < self.below)
    }
}

/// All glyph tables used by field recognition.
#[derive(Clone, Debug, Default)]
pub struct GlyphIndex {
    result_level: KnownGlyphs,
    digits: KnownGlyphs,
    select_level: KnownGlyphs,
    select_rating_major: KnownGlyphs,
    select_rating_minor: KnownGlyphs,
    select_accuracy_minor: KnownGlyphs,
}

impl GlyphIndex {
    pub fn new(tables: &GlyphTables) -> Result<Self> {
        Ok(Self {
            result_level: KnownGlyphs::from_table(&tables.result_level)
                .context("glyphs.result_level")?,
            digits: KnownGlyphs::from_table(&tables.digits).context("glyphs.digits")?,
            select_level: KnownGlyphs::from_table(&tables.select_level)
                .context("glyphs.select_level")?,
            select_rating_major: KnownGlyphs::from_table(&tables.select_rating_major)
                .context("glyphs.select_rating_major")?,
            select_rating_minor: KnownGlyphs::from_table(&tables.select_rating_minor)
                .context("glyphs.select_rating_minor")?,
            select_accuracy_minor: KnownGlyphs::from_table(&tables.select_accuracy_minor)
                .context("glyphs.select_accuracy_minor")?,
        })
    }

    pub fn get(&self, set: GlyphSet) -> &KnownGlyphs {
        match set {
            GlyphSet::ResultLevel => &self.result_level,
            GlyphSet::Digits => &self.digits,
            GlyphSet::SelectLevel => &self.select_level,
            GlyphSet::SelectRatingMajor => &self.select_rating_major,
            GlyphSet::SelectRatingMinor => &self.select_rating_minor,
            GlyphSet::SelectAccuracyMinor => &self.select_accuracy_minor,
        }
    }
}
