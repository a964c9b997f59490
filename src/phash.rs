//! 64-bit perceptual hashes and Hamming distance.
//!
//! Hashes are exchanged as 16 hex digits, the same text form the catalog
//! service stores for jacket images. The image is reduced to 32x32 luma
//! (Lanczos), transformed with a 2-D DCT-II, and the 8x8 low-frequency block
//! is thresholded strictly above its median. Bits are packed MSB first in
//! row-major order, so the first coefficient lands in the top bit.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use rustdct::{Dct2, DctPlanner};
use std::fmt;
use std::str::FromStr;

/// Side of the square the image is reduced to before the DCT.
const SAMPLE_SIZE: usize = 32;
/// Side of the low-frequency block that becomes the hash.
const HASH_SIZE: usize = 8;

/// A 64-bit perceptual hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PHash(pub u64);

impl PHash {
    /// Hashes an RGBA image.
    pub fn of_rgba(img: &RgbaImage) -> Self {
        Self::of(&DynamicImage::ImageRgba8(img.clone()))
    }

    /// Hashes any image.
    pub fn of(img: &DynamicImage) -> Self {
        let gray = luma(img);
        let small = imageops::resize(
            &gray,
            SAMPLE_SIZE as u32,
            SAMPLE_SIZE as u32,
            FilterType::Lanczos3,
        );

        let coefficients = dct_2d(&small);
        let mut low: Vec<f64> = Vec::with_capacity(HASH_SIZE * HASH_SIZE);
        for row in 0..HASH_SIZE {
            for col in 0..HASH_SIZE {
                low.push(coefficients[row * SAMPLE_SIZE + col]);
            }
        }

        let threshold = median(&low);
        let bits = low
            .iter()
            .fold(0u64, |acc, v| (acc << 1) | (*v > threshold) as u64);
        PHash(bits)
    }

    /// Parses 16 hex digits.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() != 16 {
            return Err(anyhow!("Expected 16 hex digits, got '{}'", text));
        }
        u64::from_str_radix(text, 16)
            .map(PHash)
            .map_err(|e| anyhow!("Invalid hash '{}': {}", text, e))
    }

    /// Number of differing bits.
    pub fn distance(&self, other: &PHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Bitwise complement: the hash farthest from this one. Tests use it to
    /// build references that can never match.
    #[cfg(test)]
    pub fn inverted(&self) -> Self {
        PHash(!self.0)
    }
}

/// 8-bit luma with integer ITU-R 601 weights, alpha ignored.
fn luma(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Unnormalized separable DCT-II, row-major output indexed `[vertical * N + horizontal]`.
fn dct_2d(img: &GrayImage) -> Vec<f64> {
    let n = SAMPLE_SIZE;
    let mut planner = DctPlanner::<f64>::new();
    let dct = planner.plan_dct2(n);

    let mut rows: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
    for row in rows.chunks_exact_mut(n) {
        dct.process_dct2(row);
    }

    let mut cols = vec![0.0; n * n];
    for y in 0..n {
        for x in 0..n {
            cols[x * n + y] = rows[y * n + x];
        }
    }
    for col in cols.chunks_exact_mut(n) {
        dct.process_dct2(col);
    }

    for x in 0..n {
        for y in 0..n {
            rows[y * n + x] = cols[x * n + y];
        }
    }
    rows
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl fmt::Display for PHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PHash::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_hex_round_trip() {
        let hash = PHash::from_hex("c0c73d38273ed2c3").unwrap();
        assert_eq!(hash.0, 0xc0c7_3d38_273e_d2c3);
        assert_eq!(hash.to_string(), "c0c73d38273ed2c3");
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(PHash::from_hex("").is_err());
        assert!(PHash::from_hex("c0c73d38").is_err());
        assert!(PHash::from_hex("zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_distance() {
        let a = PHash(0b1011);
        let b = PHash(0b0001);
        assert_eq!(a.distance(&b), 2);
        assert_eq!(a.distance(&a), 0);
        assert_eq!(a.distance(&a.inverted()), 64);
    }

    #[test]
    fn test_identical_images_hash_equal() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([((x * 4) % 256) as u8, ((y * 4) % 256) as u8, 128, 255])
        });
        assert_eq!(PHash::of_rgba(&img), PHash::of_rgba(&img.clone()));
    }

    #[test]
    fn test_matches_catalog_hash_format() {
        // Expected hashes computed offline in the catalog's format.
        let gray = GrayImage::from_fn(32, 32, |x, y| {
            Luma([((x * 7 + y * 13 + ((x * y) % 17) * 5) % 256) as u8])
        });
        let expected = PHash::from_hex("c194c1953768b6ed").unwrap();
        let hash = PHash::of(&DynamicImage::ImageLuma8(gray));
        assert!(hash.distance(&expected) <= 2, "got {}", hash);

        let color = RgbaImage::from_fn(32, 32, |x, y| {
            Rgba([
                ((x * 8) % 256) as u8,
                ((y * 8) % 256) as u8,
                (((x * y) % 23) * 11) as u8,
                255,
            ])
        });
        let expected = PHash::from_hex("8813127f9b127d5b").unwrap();
        let hash = PHash::of_rgba(&color);
        assert!(hash.distance(&expected) <= 2, "got {}", hash);
    }

    #[test]
    fn test_first_coefficient_is_top_bit() {
        // A flat image puts all of its energy in the DC term.
        let flat = GrayImage::from_pixel(32, 32, Luma([200]));
        let hash = PHash::of(&DynamicImage::ImageLuma8(flat));
        assert_ne!(hash.0 & (1 << 63), 0);
    }
}
