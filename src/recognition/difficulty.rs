//! Difficulty and level recognition.
//!
//! The result screen shows the difficulty as a colored badge at a fixed
//! point. The select screen lists all charts of the song; the highlighted
//! one is marked by a colored arrow whose vertical position varies, so it is
//! found by scanning a column of pixels. The level digits sit at a fixed
//! offset from that arrow.

use image::RgbaImage;

use super::fields::{FieldRecognizer, RecognitionMethod, SELECT_LEVEL};
use super::glyphs::GlyphSet;
use crate::analysis::AnalysisWarning;
use crate::calibration::{FieldKey, SELECT_PIVOT_SCAN};
use crate::catalog::{Difficulty, Song};
use crate::config::{ColorConfig, DifficultyPalette};

/// Per-channel color comparison.
pub fn color_matches(rgb: [u8; 3], target: [u8; 3], tolerance: u8, inclusive: bool) -> bool {
    rgb.iter().zip(target.iter()).all(|(a, b)| {
        let diff = a.abs_diff(*b);
        if inclusive {
            diff <= tolerance
        } else {
            diff < tolerance
        }
    })
}

fn match_palette(
    rgb: [u8; 3],
    palette: &DifficultyPalette,
    tolerance: u8,
    inclusive: bool,
) -> Option<Difficulty> {
    [
        (palette.easy, Difficulty::Easy),
        (palette.hard, Difficulty::Hard),
        (palette.over, Difficulty::Over),
        (palette.plus, Difficulty::Plus),
    ]
    .into_iter()
    .find(|(target, _)| color_matches(rgb, *target, tolerance, inclusive))
    .map(|(_, difficulty)| difficulty)
}

/// Difficulty from the result-screen badge color.
pub fn result_difficulty(rgb: [u8; 3], colors: &ColorConfig) -> Difficulty {
    match_palette(rgb, &colors.result_difficulty, colors.result_tolerance, true)
        .unwrap_or(Difficulty::Unknown)
}

/// Difficulty of a select-screen arrow pixel, if it is one.
pub fn pivot_difficulty(rgb: [u8; 3], colors: &ColorConfig) -> Option<Difficulty> {
    match_palette(rgb, &colors.select_pivot, colors.select_tolerance_below, false)
}

/// Located difficulty arrow, in reference pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pivot {
    pub x: u32,
    pub y: u32,
    pub difficulty: Difficulty,
}

/// Scans the arrow column top to bottom for the first arrow-colored pixel.
pub fn find_pivot(recognizer: &FieldRecognizer<'_>, img: &RgbaImage) -> Option<Pivot> {
    let colors = &recognizer.config().colors;
    let scan = SELECT_PIVOT_SCAN;
    (scan.y_start..scan.y_end).find_map(|y| {
        let sample = recognizer.extractor().sample_reference_point(img, scan.x, y)?;
        pivot_difficulty(sample.rgb, colors).map(|difficulty| Pivot {
            x: scan.x,
            y,
            difficulty,
        })
    })
}

/// Picks the level to report given the catalog's registered levels.
///
/// A single registered level always wins. Otherwise the read value is kept
/// if registered; if not, `glyph_fallback` gets a chance. A level that is
/// still unregistered is kept and flagged.
pub fn resolve_level<F>(read: u32, available: &[u32], glyph_fallback: F) -> (u32, Option<AnalysisWarning>)
where
    F: FnOnce() -> Option<u32>,
{
    if let [only] = available {
        return (*only, None);
    }
    if available.contains(&read) {
        return (read, None);
    }

    let level = glyph_fallback().unwrap_or(read);
    if available.contains(&level) {
        (level, None)
    } else {
        (
            level,
            Some(AnalysisWarning::AmbiguousLevel {
                level,
                available: available.to_vec(),
            }),
        )
    }
}

/// Difficulty and level of the highlighted select-screen chart.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedChart {
    pub difficulty: Difficulty,
    pub level: u32,
    pub warnings: Vec<AnalysisWarning>,
}

/// Reads the highlighted chart on the select screen.
pub fn read_selected_chart(
    recognizer: &FieldRecognizer<'_>,
    img: &RgbaImage,
    song: &Song,
    line: u8,
) -> SelectedChart {
    let Some(pivot) = find_pivot(recognizer, img) else {
        log::debug!("Pivot not found");
        return SelectedChart {
            difficulty: Difficulty::Unknown,
            level: 0,
            warnings: vec![AnalysisWarning::PivotNotFound],
        };
    };
    log::debug!("Pivot {} at ({}, {})", pivot.difficulty, pivot.x, pivot.y);

    let (dx0, dy0, dx1, dy1) = SELECT_PIVOT_SCAN.level_offset;
    let crop = recognizer.extractor().crop_reference_box(
        img,
        pivot.x.saturating_sub(dx0),
        pivot.y + dy0,
        pivot.x + dx1,
        pivot.y + dy1,
    );

    let key = FieldKey::SelectLevel;
    let read = match &crop {
        Some(crop) => {
            let field = recognizer.integer_from_crop(key, crop, SELECT_LEVEL);
            if field.method == RecognitionMethod::Ocr {
                log::debug!("OCRed level: {}", field.value);
            }
            field.value
        }
        None => 0,
    };

    let available = song.available_levels(line, pivot.difficulty);
    let (level, warning) = resolve_level(read, &available, || {
        recognizer
            .glyph_from_crop(key, crop.as_ref()?, SELECT_LEVEL.preprocess, GlyphSet::SelectLevel)
            .map(|field| field.value)
    });

    SelectedChart {
        difficulty: pivot.difficulty,
        level,
        warnings: warning.into_iter().collect(),
    }
}
