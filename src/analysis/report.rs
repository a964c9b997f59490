//! Analysis output and its text rendering.

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

use crate::calibration::ScreenType;
use crate::catalog::{Difficulty, Song};
use crate::phash::PHash;
use crate::scoring::{self, Rank};

/// Non-fatal problems noticed during an analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisWarning {
    /// The select-screen difficulty arrow was not found
    PivotNotFound,
    /// The result-screen badge color matched no difficulty
    UnknownDifficulty { rgb: [u8; 3] },
    /// The level is not one the catalog registers for this chart
    AmbiguousLevel { level: u32, available: Vec<u32> },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::PivotNotFound => {
                write!(f, "Difficulty arrow not found. Difficulty and level are unknown.")
            }
            AnalysisWarning::UnknownDifficulty { rgb } => write!(
                f,
                "Difficulty badge color ({}, {}, {}) matches no difficulty.",
                rgb[0], rgb[1], rgb[2]
            ),
            AnalysisWarning::AmbiguousLevel { level, available } => write!(
                f,
                "Level {} is NOT registered on DB (registered: {:?}). Result might be uncertain.",
                level, available
            ),
        }
    }
}

/// Note counts shown on the result screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteBreakdown {
    pub total: u32,
    pub top_high: u32,
}

/// Verified record of one screenshot.
#[derive(Clone, Debug)]
pub struct AnalysisResult {
    pub song: Arc<Song>,
    pub screen: ScreenType,
    pub score: u64,
    /// Percentage, 4 decimals
    pub accuracy: f64,
    /// P.A.T.C.H., 2 decimals
    pub rating: f64,
    pub line: u8,
    pub difficulty: Difficulty,
    pub level: u32,
    pub jacket: RgbaImage,
    pub jacket_hash: PHash,
    pub match_distance: u32,
    pub rank: Rank,
    pub is_full_combo: bool,
    pub is_perfect: bool,
    pub is_max_rating: bool,
    /// Result screen only
    pub notes: Option<NoteBreakdown>,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    /// Top-high judgements still missing for maximum P.A.T.C.H.
    ///
    /// Only meaningful for perfect plays that fell short of it.
    pub fn top_high_needed_for_max(&self, ratio: f64) -> Option<u32> {
        let notes = self.notes?;
        if !self.is_perfect || self.is_max_rating || notes.total == 0 {
            return None;
        }
        Some(scoring::top_high_needed_for_max(
            notes.total,
            notes.top_high,
            ratio,
        ))
    }
}

/// Highest achievement badge for the accuracy line.
pub(crate) fn badge(is_max_rating: bool, is_perfect: bool, is_full_combo: bool) -> &'static str {
    if is_max_rating {
        " [MAXIMUM P.A.T.C.H.]"
    } else if is_perfect {
        " [PERFECT DECODE]"
    } else if is_full_combo {
        " [FULL COMBO]"
    } else {
        ""
    }
}

/// Formats an integer with comma thousands separators.
pub(crate) fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} - {} | {}L {} Lv.{}",
            self.song.title, self.song.artist, self.line, self.difficulty, self.level
        )?;
        writeln!(
            f,
            "Judge: {:.4}% ({}){}",
            self.accuracy,
            self.rank,
            badge(self.is_max_rating, self.is_perfect, self.is_full_combo)
        )?;
        writeln!(f, "Score: {}", group_thousands(self.score as i64))?;
        write!(f, "P.A.T.C.H.: {:.2}", self.rating)?;
        for warning in &self.warnings {
            write!(f, "\nWarning: {}", warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn song(id: u32, title: &str) -> Arc<Song> {
        Arc::new(Song {
            id,
            title: title.to_string(),
            artist: "Artist".to_string(),
            bpm: "180".to_string(),
            dlc: String::new(),
            jacket_hash: None,
            plus_jacket_hash: None,
            patterns: Vec::new(),
        })
    }

    pub(crate) fn result(accuracy: f64, score: u64) -> AnalysisResult {
        AnalysisResult {
            song: song(1, "Alpha"),
            screen: ScreenType::Result,
            score,
            accuracy,
            rating: 600.0,
            line: 6,
            difficulty: Difficulty::Over,
            level: 15,
            jacket: RgbaImage::new(1, 1),
            jacket_hash: PHash(0),
            match_distance: 0,
            rank: Rank::from_accuracy(accuracy),
            is_full_combo: false,
            is_perfect: accuracy == 100.0,
            is_max_rating: false,
            notes: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-25000), "-25,000");
    }

    #[test]
    fn test_display() {
        let mut r = result(99.512, 198_500);
        r.is_full_combo = true;
        r.warnings.push(AnalysisWarning::PivotNotFound);

        let text = r.to_string();
        assert!(text.starts_with("Alpha - Artist | 6L OVER Lv.15\n"));
        assert!(text.contains("Judge: 99.5120% (SS) [FULL COMBO]"));
        assert!(text.contains("Score: 198,500"));
        assert!(text.contains("P.A.T.C.H.: 600.00"));
        assert!(text.contains("Warning: Difficulty arrow not found"));
    }

    #[test]
    fn test_top_high_needed_for_max() {
        let mut r = result(100.0, 20000);
        assert_eq!(r.top_high_needed_for_max(0.98), None, "No breakdown on select");

        r.notes = Some(NoteBreakdown {
            total: 100,
            top_high: 90,
        });
        assert_eq!(r.top_high_needed_for_max(0.98), Some(8));

        r.is_max_rating = true;
        assert_eq!(r.top_high_needed_for_max(0.98), None);
    }
}
