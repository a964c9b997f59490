//! Analyzer configuration.
//!
//! Loads settings from config.json at startup. Holds every tunable constant of
//! the recognition pipeline: hash thresholds, OCR preprocessing, difficulty
//! palettes, reference glyph hashes and the HTTP endpoint. The loaded value is
//! immutable and passed by reference into each component.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Language used for user-facing error messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ko,
    En,
}

/// Complete analyzer configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub thresholds: Thresholds,
    pub ocr: OcrConfig,
    pub colors: ColorConfig,
    pub hashes: ReferenceHashes,
    pub glyphs: GlyphTables,
    pub api: ApiConfig,
    pub locale: Locale,
}

/// Hamming-distance limits for perceptual hash comparisons.
///
/// `*_max` limits are inclusive, `*_below` limits are strict.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Jacket match is accepted when distance <= this
    pub song_match_max: u32,
    /// Speed indicator closer than this => select screen
    pub select_screen_below: u32,
    /// Rank glyph closer than this to the F reference => rank F
    pub f_rank_below: u32,
    /// Full-combo glyph closer than this => full combo (select screen)
    pub full_combo_below: u32,
    /// Top-tier-high share required for maximum P.A.T.C.H.
    pub max_rating_ratio: f64,
    /// OCR'd rating within this of the formula value is preferred
    pub rating_agreement: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            song_match_max: 5,
            select_screen_below: 5,
            f_rank_below: 5,
            full_combo_below: 5,
            max_rating_ratio: 0.98,
            rating_agreement: 0.1,
        }
    }
}

/// OCR preprocessing and engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Integer upscale factor applied before binarization
    pub upscale: u32,
    /// Luma cutoff: pixels above become foreground (white)
    pub binarize_cutoff: u8,
    /// Explicit tesseract executable, skips discovery when set
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory, skips discovery when set
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            upscale: 4,
            binarize_cutoff: 200,
            tesseract_path: None,
            tessdata_dir: None,
        }
    }
}

/// RGB values for the four difficulty tiers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DifficultyPalette {
    pub easy: [u8; 3],
    pub hard: [u8; 3],
    pub over: [u8; 3],
    pub plus: [u8; 3],
}

/// Color matching settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Difficulty badge colors on the result screen
    pub result_difficulty: DifficultyPalette,
    /// Inclusive per-channel tolerance for the result badge
    pub result_tolerance: u8,
    /// Difficulty arrow (pivot) colors on the select screen
    pub select_pivot: DifficultyPalette,
    /// Strict per-channel tolerance for the select pivot scan
    pub select_tolerance_below: u8,
    /// Color of the maximum P.A.T.C.H. marker on the select screen
    pub max_rating_marker: [u8; 3],
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            result_difficulty: DifficultyPalette {
                easy: [254, 179, 26],
                hard: [252, 109, 111],
                over: [187, 99, 219],
                plus: [69, 81, 141],
            },
            result_tolerance: 5,
            select_pivot: DifficultyPalette {
                easy: [231, 136, 40],
                hard: [234, 98, 124],
                over: [146, 115, 254],
                plus: [31, 45, 90],
            },
            select_tolerance_below: 5,
            max_rating_marker: [200, 111, 254],
        }
    }
}

/// Reference hashes (16 hex digits) for fixed UI glyphs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceHashes {
    /// Speed indicator, only present on the select screen
    pub select_speed: String,
    pub result_f_rank: String,
    pub select_f_rank: String,
    pub select_full_combo: String,
}

impl Default for ReferenceHashes {
    fn default() -> Self {
        Self {
            select_speed: "c0c73d38273ed2c3".to_string(),
            result_f_rank: "a3636e1f941a1736".to_string(),
            select_f_rank: "bb604083cfda63a7".to_string(),
            select_full_combo: "8a82953d9d376b1a".to_string(),
        }
    }
}

/// A glyph image whose value is known, identified by its hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownGlyph {
    pub value: u32,
    pub hash: String,
}

/// A set of known glyphs and the strict distance limit for accepting a match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GlyphTable {
    pub below: u32,
    pub entries: Vec<KnownGlyph>,
}

impl GlyphTable {
    fn from_pairs(below: u32, pairs: &[(u32, &str)]) -> Self {
        Self {
            below,
            entries: pairs
                .iter()
                .map(|(value, hash)| KnownGlyph {
                    value: *value,
                    hash: hash.to_string(),
                })
                .collect(),
        }
    }
}

/// Known-value glyph tables used as OCR fallbacks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphTables {
    /// Result-screen level digits (integer OCR fallback)
    pub result_level: GlyphTable,
    /// Score, tally rows and the accuracy major half
    pub digits: GlyphTable,
    /// Select-screen level next to the difficulty arrow
    pub select_level: GlyphTable,
    pub select_rating_major: GlyphTable,
    pub select_rating_minor: GlyphTable,
    pub select_accuracy_minor: GlyphTable,
}

fn level_digits() -> GlyphTable {
    GlyphTable::from_pairs(
        5,
        &[
            (5, "ec6495db9b249293"),
            (6, "eea5995a92ad9292"),
            (8, "eead9552916d9292"),
            (9, "ec32954d93b2926d"),
        ],
    )
}

impl Default for GlyphTables {
    fn default() -> Self {
        Self {
            result_level: level_digits(),
            digits: level_digits(),
            select_level: GlyphTable::from_pairs(
                3,
                &[
                    (5, "ea66a51ad2696497"),
                    (7, "eb4ae42dc42eb196"),
                    (15, "e87c8d02d369c697"),
                    (19, "e87a8d09cd699297"),
                    (21, "f26aad11d327849d"),
                ],
            ),
            select_rating_major: GlyphTable::from_pairs(
                3,
                &[
                    (609, "f3738c6596f2218c"),
                    (610, "f3738e6696a3218c"),
                    (627, "e151ca6616e93b9c"),
                    (637, "e1518e6216e52f9e"),
                    (641, "f3f19a622c93698c"),
                    (642, "f371966a2ad2658c"),
                    (661, "e3619a63af61619c"),
                    (670, "f3698c662cb3338c"),
                    (671, "f3698c662cf3138c"),
                    (676, "f36b8c6405f2738c"),
                ],
            ),
            select_rating_minor: GlyphTable::from_pairs(
                3,
                &[(22, "ae78d02f0dac78d2"), (88, "aa2ad5ad52cc2cd3")],
            ),
            select_accuracy_minor: GlyphTable::from_pairs(
                3,
                &[(5277, "9dc1aabc8183ec3b"), (5572, "9be4e6ea9110ee13")],
            ),
        }
    }
}

/// Remote archive service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Overrides the default catalog cache directory
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.platina-archive.app/api/v1".to_string(),
            cache_dir: None,
            timeout_secs: 30,
        }
    }
}

impl AnalyzerConfig {
    /// Loads configuration from `path`, or returns defaults.
    ///
    /// A missing or malformed file is logged and never fatal.
    pub fn load(path: &Path) -> Self {
        log::info!("Looking for config at: {}", path.display());

        if !path.exists() {
            log::info!("config.json not found. Using default config.");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }
}
