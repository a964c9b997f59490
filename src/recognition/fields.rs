//! Per-field recognition strategies.
//!
//! Each (screen, field) pair has a fixed strategy: how the crop is
//! preprocessed and how a value is read from it. Reading never fails; an
//! unreadable field degrades to a fallback and the method records which.

use image::{DynamicImage, GrayImage, RgbaImage};

use super::glyphs::{GlyphIndex, GlyphSet};
use crate::calibration::{CalibrationRegistry, FieldKey, PointSample, RegionExtractor, ScreenType};
use crate::config::AnalyzerConfig;
use crate::ocr::extract::{parse_decimal, parse_integer, parse_line_count};
use crate::ocr::{prepare_for_ocr, OcrProfile, TextRecognizer};
use crate::phash::PHash;

/// Line count assumed when OCR cannot read it.
pub const DEFAULT_LINE_COUNT: u8 = 6;

/// Crop preprocessing before OCR or glyph hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preprocess {
    /// Use the raw crop (hashed fields)
    None,
    /// Upscale + binarize, bright text on dark background
    Binarize,
    /// Upscale + binarize + invert, dark text on bright background
    BinarizeInverted,
}

/// How a value is read from a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Digits-only OCR, then the glyph table if the text does not parse
    Integer { fallback: Option<GlyphSet> },
    /// OCR restricted to "4" and "6"
    LineCount,
    /// Digits and "." OCR, dropped decimal point restored
    Decimal,
    /// Glyph table first, digits-only OCR if no glyph is close enough
    GlyphThenInteger { table: GlyphSet },
    /// Only the perceptual hash of the raw crop is used
    Hash,
    /// Single pixel color sample
    Color,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strategy {
    pub preprocess: Preprocess,
    pub method: Method,
}

const fn strategy(preprocess: Preprocess, method: Method) -> Strategy {
    Strategy { preprocess, method }
}

const HASHED: Strategy = strategy(Preprocess::None, Method::Hash);
const DIGITS: Strategy = strategy(
    Preprocess::Binarize,
    Method::Integer {
        fallback: Some(GlyphSet::Digits),
    },
);

/// Select-screen level box next to the difficulty arrow. Its glyph table is
/// consulted separately, once the catalog has rejected the OCR value.
pub const SELECT_LEVEL: Strategy =
    strategy(Preprocess::BinarizeInverted, Method::Integer { fallback: None });

/// Strategy for a field, or None if the field does not exist on that screen.
pub fn strategy_for(screen: ScreenType, key: FieldKey) -> Option<Strategy> {
    use FieldKey::*;

    let s = match (screen, key) {
        (_, Jacket | RankGlyph | SpeedIndicator) => HASHED,
        (_, LineCount) => strategy(Preprocess::Binarize, Method::LineCount),
        (_, Score) => DIGITS,

        (ScreenType::Result, Level) => strategy(
            Preprocess::BinarizeInverted,
            Method::Integer {
                fallback: Some(GlyphSet::ResultLevel),
            },
        ),
        (ScreenType::Result, Rating) => strategy(Preprocess::BinarizeInverted, Method::Decimal),
        (ScreenType::Result, Accuracy) => strategy(Preprocess::Binarize, Method::Decimal),
        (
            ScreenType::Result,
            TallyTotal | TallyTopHigh | TallyTop | TallyMid | TallyLow | TallyMiss,
        ) => DIGITS,
        (ScreenType::Result, DifficultyBadge) => strategy(Preprocess::None, Method::Color),

        (ScreenType::Select, AccuracyMajor) => DIGITS,
        (ScreenType::Select, AccuracyMinor) => strategy(
            Preprocess::Binarize,
            Method::GlyphThenInteger {
                table: GlyphSet::SelectAccuracyMinor,
            },
        ),
        (ScreenType::Select, RatingMajor) => strategy(
            Preprocess::Binarize,
            Method::GlyphThenInteger {
                table: GlyphSet::SelectRatingMajor,
            },
        ),
        (ScreenType::Select, RatingMinor) => strategy(
            Preprocess::Binarize,
            Method::GlyphThenInteger {
                table: GlyphSet::SelectRatingMinor,
            },
        ),
        (ScreenType::Select, FullComboGlyph) => HASHED,
        (ScreenType::Select, MaxRatingMarker) => strategy(Preprocess::None, Method::Color),
        (ScreenType::Select, SelectLevel) => SELECT_LEVEL,

        _ => return None,
    };
    Some(s)
}

/// How a field's value was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognitionMethod {
    Ocr,
    HashFallback,
    Default,
}

/// A recognized field value with its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizedField<T> {
    pub key: FieldKey,
    /// Trimmed OCR output, None if OCR was not run or failed
    pub raw: Option<String>,
    pub value: T,
    pub method: RecognitionMethod,
    /// Glyph distance when the value came from a glyph table
    pub distance: Option<u32>,
}

impl<T> RecognizedField<T> {
    fn ocr(key: FieldKey, raw: String, value: T) -> Self {
        Self {
            key,
            raw: Some(raw),
            value,
            method: RecognitionMethod::Ocr,
            distance: None,
        }
    }

    fn glyph(key: FieldKey, raw: Option<String>, value: T, distance: u32) -> Self {
        Self {
            key,
            raw,
            value,
            method: RecognitionMethod::HashFallback,
            distance: Some(distance),
        }
    }

    fn fallback(key: FieldKey, raw: Option<String>, value: T) -> Self {
        log::debug!("{}: unreadable ({:?}), using default", key, raw);
        Self {
            key,
            raw,
            value,
            method: RecognitionMethod::Default,
            distance: None,
        }
    }
}

/// A raw crop and its perceptual hash.
#[derive(Clone, Debug)]
pub struct HashedCrop {
    pub image: RgbaImage,
    pub hash: PHash,
}

/// Reads typed values from calibrated regions of a screenshot.
pub struct FieldRecognizer<'a> {
    config: &'a AnalyzerConfig,
    glyphs: &'a GlyphIndex,
    ocr: &'a dyn TextRecognizer,
    extractor: RegionExtractor<'a>,
}

impl<'a> FieldRecognizer<'a> {
    pub fn new(
        config: &'a AnalyzerConfig,
        glyphs: &'a GlyphIndex,
        registry: &'a CalibrationRegistry,
        ocr: &'a dyn TextRecognizer,
    ) -> Self {
        Self {
            config,
            glyphs,
            ocr,
            extractor: RegionExtractor::new(registry),
        }
    }

    pub fn extractor(&self) -> &RegionExtractor<'a> {
        &self.extractor
    }

    pub fn config(&self) -> &'a AnalyzerConfig {
        self.config
    }

    fn prepare(&self, crop: &RgbaImage, preprocess: Preprocess) -> GrayImage {
        match preprocess {
            Preprocess::None => image::imageops::grayscale(crop),
            Preprocess::Binarize => prepare_for_ocr(crop, &self.config.ocr, false),
            Preprocess::BinarizeInverted => prepare_for_ocr(crop, &self.config.ocr, true),
        }
    }

    fn read_text(&self, key: FieldKey, prepared: &GrayImage, profile: &OcrProfile) -> Option<String> {
        match self.ocr.recognize(key, prepared, profile) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("{}: OCR failed: {:#}", key, e);
                None
            }
        }
    }

    fn glyph_lookup(&self, key: FieldKey, set: GlyphSet, prepared: &GrayImage) -> Option<(u32, u32)> {
        let hash = PHash::of(&DynamicImage::ImageLuma8(prepared.clone()));
        let found = self.glyphs.get(set).lookup(hash);
        log::debug!("{}: glyph hash {} -> {:?}", key, hash, found);
        found
    }

    /// Reads an integer field of the screenshot.
    pub fn integer(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> RecognizedField<u32> {
        let strategy = strategy_for(screen, key).unwrap_or(DIGITS);
        match self.extractor.crop(img, screen, key) {
            Some(crop) => self.integer_from_crop(key, &crop, strategy),
            None => RecognizedField::fallback(key, None, 0),
        }
    }

    /// Reads an integer from an already cropped region.
    pub fn integer_from_crop(
        &self,
        key: FieldKey,
        crop: &RgbaImage,
        strategy: Strategy,
    ) -> RecognizedField<u32> {
        let prepared = self.prepare(crop, strategy.preprocess);

        if let Method::GlyphThenInteger { table } = strategy.method {
            if let Some((value, distance)) = self.glyph_lookup(key, table, &prepared) {
                return RecognizedField::glyph(key, None, value, distance);
            }
        }

        let raw = self.read_text(key, &prepared, &OcrProfile::INTEGER);
        if let Some(value) = raw.as_deref().and_then(parse_integer) {
            return RecognizedField::ocr(key, raw.unwrap_or_default(), value);
        }

        if let Method::Integer {
            fallback: Some(table),
        } = strategy.method
        {
            if let Some((value, distance)) = self.glyph_lookup(key, table, &prepared) {
                return RecognizedField::glyph(key, raw, value, distance);
            }
        }

        RecognizedField::fallback(key, raw, 0)
    }

    /// Matches a crop against a glyph table only, without OCR.
    pub fn glyph_from_crop(
        &self,
        key: FieldKey,
        crop: &RgbaImage,
        preprocess: Preprocess,
        set: GlyphSet,
    ) -> Option<RecognizedField<u32>> {
        let prepared = self.prepare(crop, preprocess);
        self.glyph_lookup(key, set, &prepared)
            .map(|(value, distance)| RecognizedField::glyph(key, None, value, distance))
    }

    /// Reads the line count; 6 when unreadable.
    pub fn line_count(&self, img: &RgbaImage, screen: ScreenType) -> RecognizedField<u8> {
        let key = FieldKey::LineCount;
        let Some(crop) = self.extractor.crop(img, screen, key) else {
            return RecognizedField::fallback(key, None, DEFAULT_LINE_COUNT);
        };
        let prepared = self.prepare(&crop, Preprocess::Binarize);
        let raw = self.read_text(key, &prepared, &OcrProfile::LINE_COUNT);
        match raw.as_deref().and_then(parse_line_count) {
            Some(line) => RecognizedField::ocr(key, raw.unwrap_or_default(), line),
            None => RecognizedField::fallback(key, raw, DEFAULT_LINE_COUNT),
        }
    }

    /// Reads a decimal field; 0.0 when unreadable.
    pub fn decimal(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> RecognizedField<f64> {
        let preprocess = strategy_for(screen, key)
            .map(|s| s.preprocess)
            .unwrap_or(Preprocess::Binarize);
        let Some(crop) = self.extractor.crop(img, screen, key) else {
            return RecognizedField::fallback(key, None, 0.0);
        };
        let prepared = self.prepare(&crop, preprocess);
        let raw = self.read_text(key, &prepared, &OcrProfile::DECIMAL);
        match raw.as_deref().and_then(parse_decimal) {
            Some(value) => RecognizedField::ocr(key, raw.unwrap_or_default(), value),
            None => RecognizedField::fallback(key, raw, 0.0),
        }
    }

    /// Crops a hashed field and computes its perceptual hash.
    pub fn hashed(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> Option<HashedCrop> {
        let image = self.extractor.crop(img, screen, key)?;
        let hash = PHash::of_rgba(&image);
        log::debug!("{} {}: hash {}", screen, key, hash);
        Some(HashedCrop { image, hash })
    }

    /// Samples a color field.
    pub fn sample(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> Option<PointSample> {
        self.extractor.sample(img, screen, key)
    }
}
