//! Screenshot acquisition.
//!
//! This module provides:
//! - Loading a screenshot from an image file
//! - Reading a screenshot from the system clipboard
//!
//! A missing image is an expected outcome, not an error.

use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a screenshot comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageInput {
    File(PathBuf),
    Clipboard,
}

impl fmt::Display for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageInput::File(path) => write!(f, "{}", path.display()),
            ImageInput::Clipboard => write!(f, "clipboard"),
        }
    }
}

/// Why no image could be acquired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnavailableReason {
    FileNotFound(PathBuf),
    /// File exists but is not a decodable image
    Unreadable { path: PathBuf, message: String },
    ClipboardEmpty,
    /// Clipboard could not be opened at all
    ClipboardError(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::FileNotFound(path) => {
                write!(f, "File not found at {}", path.display())
            }
            UnavailableReason::Unreadable { path, message } => {
                write!(f, "Could not read image {}: {}", path.display(), message)
            }
            UnavailableReason::ClipboardEmpty => {
                write!(f, "Clipboard is empty or does not contain an image.")
            }
            UnavailableReason::ClipboardError(message) => {
                write!(f, "Could not access the clipboard: {}", message)
            }
        }
    }
}

#[derive(Debug)]
pub enum Acquired {
    Image(RgbaImage),
    Unavailable(UnavailableReason),
}

impl ImageInput {
    /// Loads the screenshot.
    pub fn acquire(&self) -> Acquired {
        match self {
            ImageInput::File(path) => load_file(path),
            ImageInput::Clipboard => read_clipboard(),
        }
    }
}

fn load_file(path: &Path) -> Acquired {
    if !path.is_file() {
        return Acquired::Unavailable(UnavailableReason::FileNotFound(path.to_path_buf()));
    }
    match image::open(path) {
        Ok(img) => {
            log::debug!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
            Acquired::Image(img.to_rgba8())
        }
        Err(e) => Acquired::Unavailable(UnavailableReason::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn read_clipboard() -> Acquired {
    let mut clipboard = match arboard::Clipboard::new() {
        Ok(c) => c,
        Err(e) => return Acquired::Unavailable(UnavailableReason::ClipboardError(e.to_string())),
    };

    match clipboard.get_image() {
        Ok(data) => {
            let (width, height) = (data.width as u32, data.height as u32);
            match RgbaImage::from_raw(width, height, data.bytes.into_owned()) {
                Some(img) => {
                    log::debug!("Read clipboard image ({}x{})", width, height);
                    Acquired::Image(img)
                }
                None => Acquired::Unavailable(UnavailableReason::ClipboardError(format!(
                    "image buffer does not match {}x{}",
                    width, height
                ))),
            }
        }
        Err(arboard::Error::ContentNotAvailable) => {
            Acquired::Unavailable(UnavailableReason::ClipboardEmpty)
        }
        Err(e) => Acquired::Unavailable(UnavailableReason::ClipboardError(e.to_string())),
    }
}
