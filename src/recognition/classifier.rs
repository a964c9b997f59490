use anyhow::{Context, Result};
use image::RgbaImage;

use crate::calibration::{FieldKey, RegionExtractor, ScreenType};
use crate::config::{ReferenceHashes, Thresholds};
use crate::phash::PHash;

/// Tells the select screen from the result screen.
///
/// Only the select screen shows the speed indicator in the lower-left
/// corner, so its hash alone decides. The box is identical on both screens.
#[derive(Clone, Debug)]
pub struct ScreenClassifier {
    speed_indicator: PHash,
    below: u32,
}

impl ScreenClassifier {
    pub fn new(hashes: &ReferenceHashes, thresholds: &Thresholds) -> Result<Self> {
        Ok(Self {
            speed_indicator: PHash::from_hex(&hashes.select_speed)
                .context("hashes.select_speed")?,
            below: thresholds.select_screen_below,
        })
    }

    /// Classifies from the speed-indicator hash.
    pub fn classify_hash(&self, hash: PHash) -> ScreenType {
        let distance = hash.distance(&self.speed_indicator);
        log::debug!("Speed indicator distance: {}", distance);
        if distance < self.below {
            ScreenType::Select
        } else {
            ScreenType::Result
        }
    }

    /// Classifies a screenshot. Images too small to crop count as results.
    pub fn classify(&self, img: &RgbaImage, extractor: &RegionExtractor<'_>) -> ScreenType {
        match extractor.crop(img, ScreenType::Select, FieldKey::SpeedIndicator) {
            Some(crop) => self.classify_hash(PHash::of_rgba(&crop)),
            None => ScreenType::Result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationRegistry;
    use image::Rgba;

    fn classifier_for(reference: PHash) -> ScreenClassifier {
        let hashes = ReferenceHashes {
            select_speed: reference.to_string(),
            ..ReferenceHashes::default()
        };
        ScreenClassifier::new(&hashes, &Thresholds::default()).unwrap()
    }

    #[test]
    fn test_threshold_is_strict() {
        let classifier = classifier_for(PHash(0));
        assert_eq!(classifier.classify_hash(PHash(0b1111)), ScreenType::Select);
        assert_eq!(classifier.classify_hash(PHash(0b11111)), ScreenType::Result);
    }

    #[test]
    fn test_classify_screenshot() {
        let registry = CalibrationRegistry::new();
        let extractor = RegionExtractor::new(&registry);

        let mut img = RgbaImage::from_pixel(1920, 1080, Rgba([0, 0, 0, 255]));
        for y in 908..932 {
            for x in 30..119 {
                let v = if (x / 10 + y / 6) % 2 == 0 { 255 } else { 0 };
                img.put_pixel(x, y, Rgba([v, v, v, 255]));
            }
        }
        let crop = extractor
            .crop(&img, ScreenType::Select, FieldKey::SpeedIndicator)
            .unwrap();
        let indicator = PHash::of_rgba(&crop);

        assert_eq!(
            classifier_for(indicator).classify(&img, &extractor),
            ScreenType::Select
        );
        assert_eq!(
            classifier_for(indicator.inverted()).classify(&img, &extractor),
            ScreenType::Result
        );
    }

    #[test]
    fn test_bad_reference_hash() {
        let hashes = ReferenceHashes {
            select_speed: "nope".to_string(),
            ..ReferenceHashes::default()
        };
        assert!(ScreenClassifier::new(&hashes, &Thresholds::default()).is_err());
    }
}
