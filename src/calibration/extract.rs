//! Maps calibrated regions onto screenshots of arbitrary size.
//!
//! Fractions are multiplied by the actual image size and rounded to the
//! nearest pixel independently per axis. This assumes the capture is an
//! uncropped, aspect-matched scale of the 1920x1080 reference frame;
//! letterboxed captures are not corrected.

use image::{Rgba, RgbaImage};

use super::registry::{CalibrationRegistry, FieldKey, NormPoint, NormRect, Region, ScreenType};

/// A rectangle in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A sampled pixel: where it was read and its RGB value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointSample {
    pub x: u32,
    pub y: u32,
    pub rgb: [u8; 3],
}

/// Scales a fraction to a pixel index of an axis with `size` pixels.
///
/// Halves round to even so that scaled coordinates agree with the values the
/// calibration was measured with.
fn scale(fraction: f64, size: u32) -> u32 {
    let v = (fraction * size as f64).round_ties_even();
    if v <= 0.0 { 0 } else { (v as u32).min(size) }
}

/// Converts a normalized rectangle to absolute pixels, clamped to the image.
pub fn to_pixel_rect(rect: &NormRect, width: u32, height: u32) -> PixelRect {
    let x0 = scale(rect.x0, width);
    let y0 = scale(rect.y0, height);
    let x1 = scale(rect.x1, width).max(x0);
    let y1 = scale(rect.y1, height).max(y0);

    PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Converts a normalized point to an absolute pixel inside the image.
pub fn to_pixel_point(point: &NormPoint, width: u32, height: u32) -> (u32, u32) {
    let x = scale(point.x, width).min(width.saturating_sub(1));
    let y = scale(point.y, height).min(height.saturating_sub(1));
    (x, y)
}

fn rgb_at(img: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
    let Rgba([r, g, b, _]) = *img.get_pixel(x, y);
    [r, g, b]
}

/// Crops and samples calibrated regions of a screenshot.
#[derive(Clone, Copy, Debug)]
pub struct RegionExtractor<'a> {
    registry: &'a CalibrationRegistry,
}

impl<'a> RegionExtractor<'a> {
    pub fn new(registry: &'a CalibrationRegistry) -> Self {
        Self { registry }
    }

    /// Absolute pixel rectangle of a box field in an image of the given size.
    pub fn pixel_rect(
        &self,
        screen: ScreenType,
        key: FieldKey,
        width: u32,
        height: u32,
    ) -> Option<PixelRect> {
        match self.registry.lookup(screen, key)? {
            Region::Rect(rect) => Some(to_pixel_rect(&rect, width, height)),
            Region::Point(_) => None,
        }
    }

    /// Crops a box field. Returns None for point fields and for crops that
    /// collapse to zero pixels on tiny inputs.
    pub fn crop(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> Option<RgbaImage> {
        let rect = self.pixel_rect(screen, key, img.width(), img.height())?;
        crop_pixels(img, rect)
    }

    /// Samples a point field.
    pub fn sample(&self, img: &RgbaImage, screen: ScreenType, key: FieldKey) -> Option<PointSample> {
        match self.registry.lookup(screen, key)? {
            Region::Point(point) => sample_point(img, &point),
            Region::Rect(_) => None,
        }
    }

    /// Crops an ad-hoc box given in reference pixels.
    pub fn crop_reference_box(
        &self,
        img: &RgbaImage,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    ) -> Option<RgbaImage> {
        let rect = self.registry.normalize_box(x0, y0, x1, y1);
        crop_pixels(img, to_pixel_rect(&rect, img.width(), img.height()))
    }

    /// Samples an ad-hoc point given in reference pixels.
    pub fn sample_reference_point(&self, img: &RgbaImage, x: u32, y: u32) -> Option<PointSample> {
        sample_point(img, &self.registry.normalize_point(x, y))
    }
}

fn crop_pixels(img: &RgbaImage, rect: PixelRect) -> Option<RgbaImage> {
    if rect.width == 0 || rect.height == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image())
}

fn sample_point(img: &RgbaImage, point: &NormPoint) -> Option<PointSample> {
    if img.width() == 0 || img.height() == 0 {
        return None;
    }
    let (x, y) = to_pixel_point(point, img.width(), img.height());
    Some(PointSample {
        x,
        y,
        rgb: rgb_at(img, x, y),
    })
}
