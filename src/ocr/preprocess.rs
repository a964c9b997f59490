use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};

use crate::config::OcrConfig;

/// Converts an image to binary by keeping only bright pixels.
///
/// Pixels whose luma is above `cutoff` become white (foreground), all others
/// black. With `invert`, the result is flipped, for glyphs drawn darker than
/// their background.
pub fn binarize(img: &GrayImage, cutoff: u8, invert: bool) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let bright = pixel[0] > cutoff;
        let value = if bright != invert { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Prepares a cropped field for OCR.
///
/// In-game text is small and low-contrast, so the crop is upscaled with a
/// smooth filter, converted to grayscale and binarized.
pub fn prepare_for_ocr(img: &RgbaImage, config: &OcrConfig, invert: bool) -> GrayImage {
    let factor = config.upscale.max(1);
    let upscaled = imageops::resize(
        img,
        img.width() * factor,
        img.height() * factor,
        FilterType::Lanczos3,
    );
    let gray = imageops::grayscale(&upscaled);
    binarize(&gray, config.binarize_cutoff, invert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_binarize() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([100])); // dark
        img.put_pixel(1, 0, Luma([250])); // bright
        img.put_pixel(2, 0, Luma([200])); // exactly at cutoff stays background

        let result = binarize(&img, 200, false);
        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 255, "Bright pixel should become white");
        assert_eq!(result.get_pixel(2, 0)[0], 0, "Cutoff is exclusive");
    }

    #[test]
    fn test_binarize_inverted() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, Luma([10]));
        img.put_pixel(1, 0, Luma([240]));

        let result = binarize(&img, 200, true);
        assert_eq!(result.get_pixel(0, 0)[0], 255);
        assert_eq!(result.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_prepare_for_ocr_upscales() {
        let img = RgbaImage::from_pixel(10, 5, Rgba([255, 255, 255, 255]));
        let config = OcrConfig::default();

        let result = prepare_for_ocr(&img, &config, false);
        assert_eq!(result.dimensions(), (40, 20));
        assert!(result.pixels().all(|p| p[0] == 255));

        let inverted = prepare_for_ocr(&img, &config, true);
        assert!(inverted.pixels().all(|p| p[0] == 0));
    }
}
