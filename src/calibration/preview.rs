//! Preview rendering for calibration visualization.
//!
//! Draws every calibrated region of a screen onto a screenshot so the layout
//! can be checked against a capture of a different resolution.

use image::{Rgba, RgbaImage};

use super::extract::{to_pixel_point, to_pixel_rect};
use super::registry::{CalibrationRegistry, FieldKey, Region, ScreenType, SELECT_PIVOT_SCAN};

pub const COLOR_HASHED: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green
pub const COLOR_TEXT: Rgba<u8> = Rgba([0, 128, 255, 255]); // Blue
pub const COLOR_POINT: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red
pub const COLOR_SCAN: Rgba<u8> = Rgba([255, 255, 0, 255]); // Yellow

fn region_color(key: FieldKey) -> Rgba<u8> {
    match key {
        FieldKey::Jacket
        | FieldKey::RankGlyph
        | FieldKey::SpeedIndicator
        | FieldKey::FullComboGlyph => COLOR_HASHED,
        _ => COLOR_TEXT,
    }
}

/// Renders all regions of `screen` onto a copy of the screenshot.
pub fn render_preview(
    screenshot: &RgbaImage,
    screen: ScreenType,
    registry: &CalibrationRegistry,
) -> RgbaImage {
    let mut img = screenshot.clone();
    let (width, height) = img.dimensions();

    for key in registry.keys(screen) {
        match registry.lookup(screen, key) {
            Some(Region::Rect(rect)) => {
                let r = to_pixel_rect(&rect, width, height);
                draw_rect(&mut img, r.x, r.y, r.width, r.height, region_color(key), 2);
            }
            Some(Region::Point(point)) => {
                let (x, y) = to_pixel_point(&point, width, height);
                draw_crosshair(&mut img, x, y, COLOR_POINT, 15);
            }
            None => {}
        }
    }

    if screen == ScreenType::Select {
        let scan = SELECT_PIVOT_SCAN;
        let top = registry.normalize_point(scan.x, scan.y_start);
        let bottom = registry.normalize_point(scan.x, scan.y_end);
        let (x, y0) = to_pixel_point(&top, width, height);
        let (_, y1) = to_pixel_point(&bottom, width, height);
        draw_rect(&mut img, x, y0, 1, y1.saturating_sub(y0).max(1), COLOR_SCAN, 1);
    }

    img
}

/// Draws a rectangle border on an image.
pub fn draw_rect(
    img: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    thickness: u32,
) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for t in 0..thickness.min(h) {
        for dx in 0..w {
            put(x + dx, y + t);
            put(x + dx, y + h - 1 - t);
        }
    }
    for t in 0..thickness.min(w) {
        for dy in 0..h {
            put(x + t, y + dy);
            put(x + w - 1 - t, y + dy);
        }
    }
}

/// Draws a three pixel wide crosshair centered on a point.
pub fn draw_crosshair(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, arm_length: u32) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: i64, py: i64| {
        if px >= 0 && py >= 0 && (px as u32) < img_w && (py as u32) < img_h {
            img.put_pixel(px as u32, py as u32, color);
        }
    };

    let (x, y, arm) = (x as i64, y as i64, arm_length as i64);
    for d in -arm..=arm {
        for w in -1..=1 {
            put(x + d, y + w);
            put(x + w, y + d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_rect() {
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        draw_rect(&mut img, 10, 10, 50, 30, COLOR_HASHED, 2);

        assert_eq!(*img.get_pixel(10, 10), COLOR_HASHED);
        assert_eq!(*img.get_pixel(59, 39), COLOR_HASHED);
        assert_eq!(*img.get_pixel(35, 25), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_crosshair_clipped_at_edge() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        draw_crosshair(&mut img, 0, 0, COLOR_POINT, 5);

        assert_eq!(*img.get_pixel(0, 0), COLOR_POINT);
        assert_eq!(*img.get_pixel(5, 1), COLOR_POINT);
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_render_preview_marks_regions() {
        let registry = CalibrationRegistry::new();
        let img = RgbaImage::from_pixel(1920, 1080, Rgba([0, 0, 0, 255]));

        let preview = render_preview(&img, ScreenType::Result, &registry);
        // Jacket box corner and difficulty badge point
        assert_eq!(*preview.get_pixel(122, 193), COLOR_HASHED);
        assert_eq!(*preview.get_pixel(300, 730), COLOR_POINT);

        let preview = render_preview(&img, ScreenType::Select, &registry);
        assert_eq!(*preview.get_pixel(843, 700), COLOR_SCAN);
    }
}
