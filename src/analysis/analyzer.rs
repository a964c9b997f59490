//! Screenshot analysis pipeline.
//!
//! classify screen -> match jacket -> read fields -> verify arithmetic.
//! The only hard failure is an unrecognized or ambiguous jacket; every other
//! field degrades to a fallback value.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::sync::Arc;

use super::error::AnalysisError;
use super::report::{AnalysisResult, AnalysisWarning, NoteBreakdown};
use crate::calibration::{CalibrationRegistry, FieldKey, ScreenType};
use crate::capture::{Acquired, ImageInput, UnavailableReason};
use crate::catalog::{Difficulty, SongCatalog, SongMatch, SongMatcher};
use crate::config::AnalyzerConfig;
use crate::ocr::extract::join_split_value;
use crate::ocr::TextRecognizer;
use crate::phash::PHash;
use crate::recognition::difficulty::{
    color_matches, read_selected_chart, resolve_level, result_difficulty,
};
use crate::recognition::{FieldRecognizer, GlyphIndex, HashedCrop, ScreenClassifier};
use crate::scoring::{self, NoteTally, Rank};

/// Digits behind the decimal point of the split select-screen values.
const RATING_MINOR_WIDTH: usize = 2;
const ACCURACY_MINOR_WIDTH: usize = 4;

/// Outcome of analyzing one input.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Analyzed(Box<AnalysisResult>),
    NoImage(UnavailableReason),
}

/// Fixed UI glyph hashes, parsed from configuration.
#[derive(Clone, Debug)]
struct UiGlyphs {
    result_f_rank: PHash,
    select_f_rank: PHash,
    select_full_combo: PHash,
}

/// Turns screenshots into verified results against one song catalog.
///
/// Immutable once built; a catalog reload builds a new analyzer.
pub struct ScreenshotAnalyzer {
    config: AnalyzerConfig,
    registry: CalibrationRegistry,
    glyphs: GlyphIndex,
    ui: UiGlyphs,
    classifier: ScreenClassifier,
    catalog: SongCatalog,
    matcher: SongMatcher,
    ocr: Arc<dyn TextRecognizer>,
}

impl ScreenshotAnalyzer {
    pub fn new(
        config: AnalyzerConfig,
        catalog: SongCatalog,
        ocr: Arc<dyn TextRecognizer>,
    ) -> Result<Self> {
        let hashes = &config.hashes;
        let ui = UiGlyphs {
            result_f_rank: PHash::from_hex(&hashes.result_f_rank).context("hashes.result_f_rank")?,
            select_f_rank: PHash::from_hex(&hashes.select_f_rank).context("hashes.select_f_rank")?,
            select_full_combo: PHash::from_hex(&hashes.select_full_combo)
                .context("hashes.select_full_combo")?,
        };
        let classifier = ScreenClassifier::new(hashes, &config.thresholds)?;
        let glyphs = GlyphIndex::new(&config.glyphs)?;
        let matcher = SongMatcher::new(&catalog);
        log::debug!(
            "Analyzer ready: {} songs, {} jacket hashes",
            catalog.len(),
            matcher.len()
        );
        if matcher.is_empty() {
            log::warn!("The song catalog has no jacket hashes, no song can be recognized");
        }

        Ok(Self {
            config,
            registry: CalibrationRegistry::new(),
            glyphs,
            ui,
            classifier,
            catalog,
            matcher,
            ocr,
        })
    }

    /// Same configuration and OCR engine, different catalog.
    pub fn with_catalog(&self, catalog: SongCatalog) -> Result<Self> {
        Self::new(self.config.clone(), catalog, Arc::clone(&self.ocr))
    }

    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    fn recognizer(&self) -> FieldRecognizer<'_> {
        FieldRecognizer::new(&self.config, &self.glyphs, &self.registry, self.ocr.as_ref())
    }

    /// Acquires and analyzes a screenshot.
    pub fn extract_info(&self, input: &ImageInput) -> Result<AnalysisOutcome, AnalysisError> {
        match input.acquire() {
            Acquired::Image(img) => self
                .analyze(&img)
                .map(|result| AnalysisOutcome::Analyzed(Box::new(result))),
            Acquired::Unavailable(reason) => {
                log::warn!("{}", reason);
                Ok(AnalysisOutcome::NoImage(reason))
            }
        }
    }

    /// Analyzes a screenshot already in memory.
    pub fn analyze(&self, img: &RgbaImage) -> Result<AnalysisResult, AnalysisError> {
        let recognizer = self.recognizer();
        let screen = self.classifier.classify(img, recognizer.extractor());
        log::info!("Analyzing {}x{} {} screen", img.width(), img.height(), screen);

        match screen {
            ScreenType::Result => self.analyze_result(&recognizer, img),
            ScreenType::Select => self.analyze_select(&recognizer, img),
        }
    }

    fn match_jacket(
        &self,
        recognizer: &FieldRecognizer<'_>,
        img: &RgbaImage,
        screen: ScreenType,
    ) -> Result<(HashedCrop, SongMatch), AnalysisError> {
        let jacket = recognizer
            .hashed(img, screen, FieldKey::Jacket)
            .ok_or(AnalysisError::SongNotRecognized {
                best_distance: None,
            })?;
        let matched = self
            .matcher
            .identify(jacket.hash, self.config.thresholds.song_match_max)?;
        log::debug!(
            "Jacket {} matched '{}' ({:?} jacket) at distance {}",
            jacket.hash,
            matched.song.title,
            matched.variant,
            matched.distance
        );
        Ok((jacket, matched))
    }

    /// True if the hashed field is strictly closer than `below` to `reference`.
    fn glyph_matches(
        recognizer: &FieldRecognizer<'_>,
        img: &RgbaImage,
        screen: ScreenType,
        key: FieldKey,
        reference: PHash,
        below: u32,
    ) -> bool {
        recognizer
            .hashed(img, screen, key)
            .map(|crop| crop.hash.distance(&reference) < below)
            .unwrap_or(false)
    }

    fn analyze_result(
        &self,
        recognizer: &FieldRecognizer<'_>,
        img: &RgbaImage,
    ) -> Result<AnalysisResult, AnalysisError> {
        let screen = ScreenType::Result;
        let thresholds = &self.config.thresholds;
        let (jacket, matched) = self.match_jacket(recognizer, img, screen)?;
        let song = matched.song;
        let mut warnings = Vec::new();

        let line = recognizer.line_count(img, screen).value;
        let level_read = recognizer.integer(img, screen, FieldKey::Level).value;
        let rating_read = recognizer.decimal(img, screen, FieldKey::Rating).value;

        let total = recognizer.integer(img, screen, FieldKey::TallyTotal).value;
        let read_tally = NoteTally::new(
            recognizer.integer(img, screen, FieldKey::TallyTopHigh).value,
            recognizer.integer(img, screen, FieldKey::TallyTop).value,
            recognizer.integer(img, screen, FieldKey::TallyMid).value,
            recognizer.integer(img, screen, FieldKey::TallyLow).value,
            recognizer.integer(img, screen, FieldKey::TallyMiss).value,
        );
        let tally = scoring::repair_tally(total, read_tally);

        let difficulty = match recognizer.sample(img, screen, FieldKey::DifficultyBadge) {
            Some(sample) => {
                let difficulty = result_difficulty(sample.rgb, &self.config.colors);
                if difficulty == Difficulty::Unknown {
                    warnings.push(AnalysisWarning::UnknownDifficulty { rgb: sample.rgb });
                }
                difficulty
            }
            None => Difficulty::Unknown,
        };

        let accuracy = scoring::accuracy(&tally);
        let score = scoring::score(&tally);
        let mut rank = Rank::from_accuracy(accuracy);
        if Self::glyph_matches(
            recognizer,
            img,
            screen,
            FieldKey::RankGlyph,
            self.ui.result_f_rank,
            thresholds.f_rank_below,
        ) {
            rank = Rank::F;
        }

        let available = song.available_levels(line, difficulty);
        let (level, level_warning) = resolve_level(level_read, &available, || None);
        warnings.extend(level_warning);

        let formula = scoring::rating(level, rank, difficulty.is_plus(), accuracy);
        let rating =
            scoring::cross_validate_rating(formula, rating_read, accuracy, thresholds.rating_agreement);
        log::debug!(
            "Rating: formula {:.2}, read {:.2}, using {:.2}",
            formula,
            rating_read,
            rating
        );

        if log::log_enabled!(log::Level::Debug) {
            let shown = recognizer.integer(img, screen, FieldKey::Score).value as u64;
            if shown != score {
                log::debug!("Displayed score {} differs from computed {}", shown, score);
            }
            let shown = recognizer.decimal(img, screen, FieldKey::Accuracy).value;
            if shown != accuracy {
                log::debug!("Displayed accuracy {} differs from computed {}", shown, accuracy);
            }
        }

        let is_perfect = accuracy == 100.0;
        let is_full_combo = tally.miss == 0 || is_perfect;
        let is_max_rating =
            scoring::is_max_rating(accuracy, total, tally.top_high, thresholds.max_rating_ratio);

        Ok(AnalysisResult {
            song,
            screen,
            score,
            accuracy,
            rating,
            line,
            difficulty,
            level,
            jacket: jacket.image,
            jacket_hash: jacket.hash,
            match_distance: matched.distance,
            rank,
            is_full_combo,
            is_perfect,
            is_max_rating,
            notes: Some(NoteBreakdown {
                total,
                top_high: tally.top_high,
            }),
            warnings,
        })
    }

    fn analyze_select(
        &self,
        recognizer: &FieldRecognizer<'_>,
        img: &RgbaImage,
    ) -> Result<AnalysisResult, AnalysisError> {
        let screen = ScreenType::Select;
        let thresholds = &self.config.thresholds;
        let colors = &self.config.colors;
        let (jacket, matched) = self.match_jacket(recognizer, img, screen)?;
        let song = matched.song;

        let line = recognizer.line_count(img, screen).value;
        let score = recognizer.integer(img, screen, FieldKey::Score).value as u64;

        let rating = join_split_value(
            recognizer.integer(img, screen, FieldKey::RatingMajor).value,
            recognizer.integer(img, screen, FieldKey::RatingMinor).value,
            RATING_MINOR_WIDTH,
        );
        let accuracy = join_split_value(
            recognizer.integer(img, screen, FieldKey::AccuracyMajor).value,
            recognizer.integer(img, screen, FieldKey::AccuracyMinor).value,
            ACCURACY_MINOR_WIDTH,
        );

        let chart = read_selected_chart(recognizer, img, &song, line);

        let is_perfect = accuracy == 100.0;
        let is_full_combo = is_perfect
            || Self::glyph_matches(
                recognizer,
                img,
                screen,
                FieldKey::FullComboGlyph,
                self.ui.select_full_combo,
                thresholds.full_combo_below,
            );
        let is_max_rating = recognizer
            .sample(img, screen, FieldKey::MaxRatingMarker)
            .map(|sample| {
                color_matches(
                    sample.rgb,
                    colors.max_rating_marker,
                    colors.select_tolerance_below,
                    false,
                )
            })
            .unwrap_or(false);

        let mut rank = Rank::from_accuracy(accuracy);
        if Self::glyph_matches(
            recognizer,
            img,
            screen,
            FieldKey::RankGlyph,
            self.ui.select_f_rank,
            thresholds.f_rank_below,
        ) {
            rank = Rank::F;
        }

        Ok(AnalysisResult {
            song,
            screen,
            score,
            accuracy,
            rating,
            line,
            difficulty: chart.difficulty,
            level: chart.level,
            jacket: jacket.image,
            jacket_hash: jacket.hash,
            match_distance: matched.distance,
            rank,
            is_full_combo,
            is_perfect,
            is_max_rating,
            notes: None,
            warnings: chart.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::RegionExtractor;
    use crate::catalog::{PatternFeed, SongFeed};
    use crate::recognition::fields::tests::ScriptedOcr;
    use image::Rgba;
    use serde_json::json;
    use tempfile::tempdir;

    fn paint(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, rgb: [u8; 3]) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], 255]));
            }
        }
    }

    /// Blocky pattern so that perceptual hashes are distinctive.
    fn texture(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, seed: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                let v = (((x - x0) / 24 * 7 + (y - y0) / 24 * 13 + seed) % 5 * 60) as u8;
                img.put_pixel(x, y, Rgba([v, 255 - v, v / 2, 255]));
            }
        }
    }

    fn crop_hash(img: &RgbaImage, screen: ScreenType, key: FieldKey) -> PHash {
        let registry = CalibrationRegistry::new();
        let crop = RegionExtractor::new(&registry).crop(img, screen, key).unwrap();
        PHash::of_rgba(&crop)
    }

    fn catalog(jacket: PHash, patterns: serde_json::Value) -> SongCatalog {
        let songs: Vec<SongFeed> = serde_json::from_value(json!([
            { "songID": 7, "title": "Alpha", "artist": "A", "pHash": jacket.to_string() },
            { "songID": 8, "title": "Beta", "artist": "B", "pHash": jacket.inverted().to_string() }
        ]))
        .unwrap();
        let patterns: Vec<PatternFeed> = serde_json::from_value(patterns).unwrap();
        SongCatalog::from_feed(songs, patterns)
    }

    /// Config whose reference glyphs never match the test image except where
    /// a test opts in.
    fn base_config(img: &RgbaImage, screen: ScreenType) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::default();
        let speed = crop_hash(img, screen, FieldKey::SpeedIndicator);
        config.hashes.select_speed = match screen {
            ScreenType::Select => speed.to_string(),
            ScreenType::Result => speed.inverted().to_string(),
        };
        let rank = crop_hash(img, screen, FieldKey::RankGlyph).inverted().to_string();
        config.hashes.result_f_rank = rank.clone();
        config.hashes.select_f_rank = rank;
        for table in [
            &mut config.glyphs.result_level,
            &mut config.glyphs.select_level,
            &mut config.glyphs.select_rating_major,
            &mut config.glyphs.select_rating_minor,
            &mut config.glyphs.select_accuracy_minor,
        ] {
            table.entries.clear();
        }
        config
    }

    fn result_screenshot(badge: [u8; 3]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(1920, 1080, Rgba([0, 0, 0, 255]));
        texture(&mut img, 122, 193, 522, 593, 1);
        paint(&mut img, 290, 720, 310, 740, badge);
        img
    }

    fn perfect_tally_ocr(level: &str) -> ScriptedOcr {
        ScriptedOcr::new(&[
            (FieldKey::LineCount, "6"),
            (FieldKey::Level, level),
            (FieldKey::Rating, "63000"),
            (FieldKey::Score, "20000"),
            (FieldKey::TallyTotal, "100"),
            (FieldKey::TallyTopHigh, "100"),
            (FieldKey::TallyTop, "0"),
            (FieldKey::TallyMid, "0"),
            (FieldKey::TallyLow, "0"),
            (FieldKey::TallyMiss, "0"),
        ])
    }

    #[test]
    fn test_result_screen_perfect_play() {
        let img = result_screenshot([187, 99, 219]);
        let jacket = crop_hash(&img, ScreenType::Result, FieldKey::Jacket);
        let catalog = catalog(
            jacket,
            json!([
                { "songID": 7, "line": 6, "difficulty": "OVER", "level": 15, "designer": "d" },
                { "songID": 7, "line": 6, "difficulty": "OVER", "level": 16, "designer": "d" }
            ]),
        );
        let config = base_config(&img, ScreenType::Result);
        let analyzer =
            ScreenshotAnalyzer::new(config, catalog, Arc::new(perfect_tally_ocr("15"))).unwrap();

        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.screen, ScreenType::Result);
        assert_eq!(result.song.id, 7);
        assert_eq!(result.match_distance, 0);
        assert_eq!(result.line, 6);
        assert_eq!(result.difficulty, Difficulty::Over);
        assert_eq!(result.level, 15);
        assert_eq!(result.accuracy, 100.0);
        assert_eq!(result.score, 20000);
        assert_eq!(result.rank, Rank::SSPlus);
        assert_eq!(result.rating, 630.0);
        assert!(result.is_perfect && result.is_full_combo && result.is_max_rating);
        assert_eq!(
            result.notes,
            Some(NoteBreakdown {
                total: 100,
                top_high: 100
            })
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_result_screen_degraded_fields() {
        // Unknown badge color, unreadable level
        let img = result_screenshot([10, 200, 10]);
        let jacket = crop_hash(&img, ScreenType::Result, FieldKey::Jacket);
        let catalog = catalog(jacket, json!([]));
        let config = base_config(&img, ScreenType::Result);
        let ocr = ScriptedOcr::new(&[
            (FieldKey::TallyTotal, "500"),
            (FieldKey::TallyTopHigh, "450"),
            (FieldKey::TallyTop, "40"),
            (FieldKey::TallyMid, "5"),
            (FieldKey::TallyLow, "3"),
            (FieldKey::TallyMiss, "5"),
        ]);
        let analyzer = ScreenshotAnalyzer::new(config, catalog, Arc::new(ocr)).unwrap();

        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.line, 6, "Line falls back to 6");
        assert_eq!(result.difficulty, Difficulty::Unknown);
        assert_eq!(result.level, 0);
        // Miss repaired from 5 to 2: (490 * 100 + 5 * 70 + 3 * 30) / 500
        assert_eq!(result.accuracy, 98.88);
        assert_eq!(result.score, 450 * 200 + 40 * 150 + 5 * 100);
        assert_eq!(result.rank, Rank::S);
        assert!(!result.is_full_combo);
        assert!(result
            .warnings
            .contains(&AnalysisWarning::UnknownDifficulty { rgb: [10, 200, 10] }));
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            AnalysisWarning::AmbiguousLevel { level: 0, .. }
        )));
    }

    #[test]
    fn test_single_registered_level_overrides_ocr() {
        let img = result_screenshot([69, 81, 141]);
        let jacket = crop_hash(&img, ScreenType::Result, FieldKey::Jacket);
        let catalog = catalog(
            jacket,
            json!([{ "songID": 7, "line": 6, "difficulty": "PLUS", "level": 17, "designer": "d" }]),
        );
        let config = base_config(&img, ScreenType::Result);
        let analyzer =
            ScreenshotAnalyzer::new(config, catalog, Arc::new(perfect_tally_ocr("1"))).unwrap();

        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.difficulty, Difficulty::Plus);
        assert_eq!(result.level, 17);
        // Perfect play keeps the displayed rating
        assert_eq!(result.rating, 630.0);
    }

    #[test]
    fn test_f_rank_from_glyph() {
        let img = result_screenshot([187, 99, 219]);
        let jacket = crop_hash(&img, ScreenType::Result, FieldKey::Jacket);
        let catalog = catalog(
            jacket,
            json!([{ "songID": 7, "line": 6, "difficulty": "OVER", "level": 15, "designer": "d" }]),
        );
        let mut config = base_config(&img, ScreenType::Result);
        config.hashes.result_f_rank =
            crop_hash(&img, ScreenType::Result, FieldKey::RankGlyph).to_string();
        let ocr = ScriptedOcr::new(&[
            (FieldKey::TallyTotal, "100"),
            (FieldKey::TallyTopHigh, "50"),
            (FieldKey::TallyTop, "0"),
            (FieldKey::TallyMid, "0"),
            (FieldKey::TallyLow, "0"),
            (FieldKey::TallyMiss, "50"),
        ]);
        let analyzer = ScreenshotAnalyzer::new(config, catalog, Arc::new(ocr)).unwrap();

        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.rank, Rank::F);
        assert_eq!(result.rating, 0.0);
    }

    #[test]
    fn test_unknown_jacket_is_rejected() {
        let img = result_screenshot([187, 99, 219]);
        let jacket = crop_hash(&img, ScreenType::Result, FieldKey::Jacket);
        // Neither song is within 5 bits of the screenshot
        let far = PHash(jacket.0 ^ 0x3f);
        let catalog = catalog(far, json!([]));
        let config = base_config(&img, ScreenType::Result);
        let analyzer =
            ScreenshotAnalyzer::new(config, catalog, Arc::new(ScriptedOcr::new(&[]))).unwrap();

        assert_eq!(
            analyzer.analyze(&img).unwrap_err(),
            AnalysisError::SongNotRecognized {
                best_distance: Some(6)
            }
        );
    }

    #[test]
    fn test_select_screen() {
        let mut img = RgbaImage::from_pixel(1920, 1080, Rgba([0, 0, 0, 255]));
        texture(&mut img, 760, 66, 1160, 466, 2);
        texture(&mut img, 30, 908, 119, 932, 3);
        let config_colors = AnalyzerConfig::default().colors;
        paint(&mut img, 840, 700, 850, 720, config_colors.select_pivot.hard);
        paint(&mut img, 1028, 721, 1038, 731, config_colors.max_rating_marker);

        let jacket = crop_hash(&img, ScreenType::Select, FieldKey::Jacket);
        let catalog = catalog(
            jacket,
            json!([
                { "songID": 7, "line": 4, "difficulty": "HARD", "level": 9, "designer": "d" },
                { "songID": 7, "line": 4, "difficulty": "HARD", "level": 11, "designer": "d" }
            ]),
        );
        let mut config = base_config(&img, ScreenType::Select);
        config.hashes.select_full_combo =
            crop_hash(&img, ScreenType::Select, FieldKey::FullComboGlyph).to_string();
        let ocr = ScriptedOcr::new(&[
            (FieldKey::LineCount, "4"),
            (FieldKey::Score, "198500"),
            (FieldKey::RatingMajor, "641"),
            (FieldKey::RatingMinor, "5"),
            (FieldKey::AccuracyMajor, "99"),
            (FieldKey::AccuracyMinor, "512"),
            (FieldKey::SelectLevel, "11"),
        ]);
        let analyzer = ScreenshotAnalyzer::new(config, catalog, Arc::new(ocr)).unwrap();

        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.screen, ScreenType::Select);
        assert_eq!(result.song.id, 7);
        assert_eq!(result.line, 4);
        assert_eq!(result.score, 198500);
        assert_eq!(result.rating, 641.05);
        assert_eq!(result.accuracy, 99.0512);
        assert_eq!(result.rank, Rank::SPlus);
        assert_eq!(result.difficulty, Difficulty::Hard);
        assert_eq!(result.level, 11);
        assert!(result.is_full_combo);
        assert!(!result.is_perfect);
        assert!(result.is_max_rating);
        assert!(result.notes.is_none());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_extract_info_without_image() {
        let dir = tempdir().unwrap();
        let analyzer = ScreenshotAnalyzer::new(
            AnalyzerConfig::default(),
            SongCatalog::default(),
            Arc::new(ScriptedOcr::new(&[])),
        )
        .unwrap();

        let outcome = analyzer
            .extract_info(&ImageInput::File(dir.path().join("missing.png")))
            .unwrap();
        assert!(matches!(
            outcome,
            AnalysisOutcome::NoImage(UnavailableReason::FileNotFound(_))
        ));
    }

    #[test]
    fn test_with_catalog_swaps_songs() {
        let analyzer = ScreenshotAnalyzer::new(
            AnalyzerConfig::default(),
            SongCatalog::default(),
            Arc::new(ScriptedOcr::new(&[])),
        )
        .unwrap();
        assert!(analyzer.catalog().is_empty());

        let reloaded = analyzer.with_catalog(catalog(PHash(0), json!([]))).unwrap();
        assert_eq!(reloaded.catalog().len(), 2);
    }
}
