//! Static region definitions for the two recognized screens.
//!
//! All coordinates are reference pixels of a 1920x1080 capture. They are only
//! converted to fractions at lookup time, so the tables stay diffable against
//! a screenshot opened in an image editor.

use std::fmt;

pub const REFERENCE_WIDTH: u32 = 1920;
pub const REFERENCE_HEIGHT: u32 = 1080;

/// Horizontal span shared by every note-tally row on the result screen.
pub const TALLY_SPAN: (u32, u32) = (874, 950);

/// Which screen a screenshot shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScreenType {
    /// Song select screen showing the stored best of the highlighted chart
    Select,
    /// Result screen shown after a play
    Result,
}

impl fmt::Display for ScreenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenType::Select => write!(f, "SELECT"),
            ScreenType::Result => write!(f, "RESULT"),
        }
    }
}

/// Semantic name of a calibrated region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Jacket,
    LineCount,
    Score,
    RankGlyph,
    SpeedIndicator,
    // Result screen
    Accuracy,
    Level,
    Rating,
    TallyTotal,
    TallyTopHigh,
    TallyTop,
    TallyMid,
    TallyLow,
    TallyMiss,
    DifficultyBadge,
    // Select screen
    AccuracyMajor,
    AccuracyMinor,
    RatingMajor,
    RatingMinor,
    FullComboGlyph,
    MaxRatingMarker,
    SelectLevel,
}

impl FieldKey {
    /// Short snake_case name, used for logs and dumped file names.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKey::Jacket => "jacket",
            FieldKey::LineCount => "line",
            FieldKey::Score => "score",
            FieldKey::RankGlyph => "rank",
            FieldKey::SpeedIndicator => "speed",
            FieldKey::Accuracy => "judge",
            FieldKey::Level => "level",
            FieldKey::Rating => "patch",
            FieldKey::TallyTotal => "total_notes",
            FieldKey::TallyTopHigh => "perfect_high",
            FieldKey::TallyTop => "perfect",
            FieldKey::TallyMid => "great",
            FieldKey::TallyLow => "good",
            FieldKey::TallyMiss => "miss",
            FieldKey::DifficultyBadge => "difficulty_color",
            FieldKey::AccuracyMajor => "major_judge",
            FieldKey::AccuracyMinor => "minor_judge",
            FieldKey::RatingMajor => "major_patch",
            FieldKey::RatingMinor => "minor_patch",
            FieldKey::FullComboGlyph => "full_combo",
            FieldKey::MaxRatingMarker => "max_patch",
            FieldKey::SelectLevel => "select_level",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A region as stored, in reference pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefShape {
    /// Bounding box, end coordinates exclusive
    Box { x0: u32, y0: u32, x1: u32, y1: u32 },
    /// Single pixel
    Point { x: u32, y: u32 },
    /// Tally row: vertical span only, horizontal span is `TALLY_SPAN`
    TallyRow { y0: u32, y1: u32 },
}

/// Rectangle as fractions (0.0-1.0) of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Point as fractions (0.0-1.0) of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormPoint {
    pub x: f64,
    pub y: f64,
}

/// A normalized, resolution-independent region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Region {
    Rect(NormRect),
    Point(NormPoint),
}

const fn bbox(x0: u32, y0: u32, x1: u32, y1: u32) -> RefShape {
    RefShape::Box { x0, y0, x1, y1 }
}

const fn row(y0: u32, y1: u32) -> RefShape {
    RefShape::TallyRow { y0, y1 }
}

const SPEED_INDICATOR: RefShape = bbox(30, 908, 119, 932);

const SELECT_REGIONS: &[(FieldKey, RefShape)] = &[
    (FieldKey::Jacket, bbox(760, 66, 1160, 466)),
    (FieldKey::AccuracyMajor, bbox(979, 846, 1015, 865)),
    (FieldKey::AccuracyMinor, bbox(1019, 848, 1059, 865)),
    (FieldKey::LineCount, bbox(143, 32, 361, 78)),
    (FieldKey::RatingMajor, bbox(891, 741, 1026, 786)),
    (FieldKey::RatingMinor, bbox(1032, 752, 1078, 786)),
    (FieldKey::Score, bbox(961, 803, 1078, 826)),
    (FieldKey::FullComboGlyph, bbox(1109, 867, 1320, 900)),
    (FieldKey::MaxRatingMarker, RefShape::Point { x: 1033, y: 726 }),
    (FieldKey::RankGlyph, bbox(1151, 684, 1280, 812)),
    (FieldKey::SpeedIndicator, SPEED_INDICATOR),
];

const RESULT_REGIONS: &[(FieldKey, RefShape)] = &[
    (FieldKey::Jacket, bbox(122, 193, 522, 593)),
    (FieldKey::Accuracy, bbox(959, 301, 1283, 367)),
    (FieldKey::LineCount, bbox(37, 32, 75, 81)),
    (FieldKey::Level, bbox(395, 700, 502, 762)),
    (FieldKey::Rating, bbox(979, 186, 1320, 251)),
    (FieldKey::Score, bbox(953, 418, 1316, 483)),
    (FieldKey::RankGlyph, bbox(1020, 575, 1345, 890)),
    (FieldKey::TallyTotal, row(589, 614)),
    (FieldKey::TallyTopHigh, row(650, 675)),
    (FieldKey::TallyTop, row(686, 713)),
    (FieldKey::TallyMid, row(725, 751)),
    (FieldKey::TallyLow, row(764, 788)),
    (FieldKey::TallyMiss, row(800, 828)),
    (FieldKey::DifficultyBadge, RefShape::Point { x: 300, y: 730 }),
    (FieldKey::SpeedIndicator, SPEED_INDICATOR),
];

/// Select-screen difficulty arrow scan, in reference pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PivotScan {
    pub x: u32,
    pub y_start: u32,
    /// Exclusive
    pub y_end: u32,
    /// Level box relative to the pivot: (dx0, dy0, dx1, dy1), dx0 subtracted
    pub level_offset: (u32, u32, u32, u32),
}

pub const SELECT_PIVOT_SCAN: PivotScan = PivotScan {
    x: 843,
    y_start: 627,
    y_end: 1040,
    level_offset: (105, 29, 0, 95),
};

/// Lookup table from (screen, field) to calibrated region.
#[derive(Clone, Debug)]
pub struct CalibrationRegistry {
    reference_width: f64,
    reference_height: f64,
}

impl Default for CalibrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self {
            reference_width: REFERENCE_WIDTH as f64,
            reference_height: REFERENCE_HEIGHT as f64,
        }
    }

    fn table(screen: ScreenType) -> &'static [(FieldKey, RefShape)] {
        match screen {
            ScreenType::Select => SELECT_REGIONS,
            ScreenType::Result => RESULT_REGIONS,
        }
    }

    /// Raw reference-pixel shape of a field.
    pub fn reference_shape(&self, screen: ScreenType, key: FieldKey) -> Option<RefShape> {
        Self::table(screen)
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, shape)| *shape)
    }

    /// All field keys calibrated for a screen, in table order.
    pub fn keys(&self, screen: ScreenType) -> impl Iterator<Item = FieldKey> {
        Self::table(screen).iter().map(|(k, _)| *k)
    }

    /// Normalized region of a field, or None if the screen has no such field.
    pub fn lookup(&self, screen: ScreenType, key: FieldKey) -> Option<Region> {
        let shape = self.reference_shape(screen, key)?;
        Some(match shape {
            RefShape::Box { x0, y0, x1, y1 } => Region::Rect(self.normalize_box(x0, y0, x1, y1)),
            RefShape::TallyRow { y0, y1 } => {
                Region::Rect(self.normalize_box(TALLY_SPAN.0, y0, TALLY_SPAN.1, y1))
            }
            RefShape::Point { x, y } => Region::Point(self.normalize_point(x, y)),
        })
    }

    /// Converts a reference-pixel box to fractions of the frame.
    pub fn normalize_box(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> NormRect {
        NormRect {
            x0: x0 as f64 / self.reference_width,
            y0: y0 as f64 / self.reference_height,
            x1: x1 as f64 / self.reference_width,
            y1: y1 as f64 / self.reference_height,
        }
    }

    /// Converts a reference-pixel point to fractions of the frame.
    pub fn normalize_point(&self, x: u32, y: u32) -> NormPoint {
        NormPoint {
            x: x as f64 / self.reference_width,
            y: y as f64 / self.reference_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_lookup_is_normalized() {
        let registry = CalibrationRegistry::new();
        let region = registry.lookup(ScreenType::Result, FieldKey::Jacket).unwrap();
        match region {
            Region::Rect(r) => {
                assert!((r.x0 - 122.0 / 1920.0).abs() < 1e-12);
                assert!((r.y1 - 593.0 / 1080.0).abs() < 1e-12);
            }
            Region::Point(_) => panic!("jacket should be a box"),
        }
    }

    #[test]
    fn test_tally_rows_share_horizontal_span() {
        let registry = CalibrationRegistry::new();
        let keys = [
            FieldKey::TallyTotal,
            FieldKey::TallyTopHigh,
            FieldKey::TallyTop,
            FieldKey::TallyMid,
            FieldKey::TallyLow,
            FieldKey::TallyMiss,
        ];
        let rects: Vec<NormRect> = keys
            .iter()
            .map(|k| match registry.lookup(ScreenType::Result, *k) {
                Some(Region::Rect(r)) => r,
                other => panic!("{:?} resolved to {:?}", k, other),
            })
            .collect();

        for r in &rects {
            assert_eq!(r.x0, 874.0 / 1920.0);
            assert_eq!(r.x1, 950.0 / 1920.0);
        }
        // Rows are stacked top to bottom
        for pair in rects.windows(2) {
            assert!(pair[0].y1 <= pair[1].y0);
        }
    }

    #[test]
    fn test_point_lookup() {
        let registry = CalibrationRegistry::new();
        assert_eq!(
            registry.lookup(ScreenType::Result, FieldKey::DifficultyBadge),
            Some(Region::Point(NormPoint {
                x: 300.0 / 1920.0,
                y: 730.0 / 1080.0
            }))
        );
    }

    #[test]
    fn test_screen_specific_keys() {
        let registry = CalibrationRegistry::new();
        assert!(registry.lookup(ScreenType::Select, FieldKey::TallyMiss).is_none());
        assert!(registry.lookup(ScreenType::Result, FieldKey::FullComboGlyph).is_none());
        assert!(registry.lookup(ScreenType::Select, FieldKey::SpeedIndicator).is_some());
        assert!(registry.lookup(ScreenType::Result, FieldKey::SpeedIndicator).is_some());
    }

    #[test]
    fn test_every_box_is_inside_reference_frame() {
        let registry = CalibrationRegistry::new();
        for screen in [ScreenType::Select, ScreenType::Result] {
            for key in registry.keys(screen) {
                match registry.lookup(screen, key).unwrap() {
                    Region::Rect(r) => {
                        assert!(r.x0 < r.x1 && r.y0 < r.y1, "{} {} is empty", screen, key);
                        assert!(r.x1 <= 1.0 && r.y1 <= 1.0);
                    }
                    Region::Point(p) => assert!(p.x < 1.0 && p.y < 1.0),
                }
            }
        }
    }
}
