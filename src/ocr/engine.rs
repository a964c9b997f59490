use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use crate::calibration::FieldKey;

/// Tesseract parameters for one kind of field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OcrProfile {
    /// Page segmentation mode (7 = single text line)
    pub psm: u8,
    /// OCR engine mode (1 = LSTM only), None keeps Tesseract's default
    pub oem: Option<u8>,
    /// Characters Tesseract may emit
    pub whitelist: &'static str,
}

impl OcrProfile {
    /// Digits only: scores, tallies, levels.
    pub const INTEGER: OcrProfile = OcrProfile {
        psm: 7,
        oem: Some(1),
        whitelist: "0123456789",
    };

    /// Line count is only ever 4 or 6.
    pub const LINE_COUNT: OcrProfile = OcrProfile {
        psm: 7,
        oem: None,
        whitelist: "46",
    };

    /// Decimal values such as "2.79".
    pub const DECIMAL: OcrProfile = OcrProfile {
        psm: 7,
        oem: None,
        whitelist: "0123456789.",
    };

    /// Tesseract command-line arguments for this profile.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--psm".to_string(), self.psm.to_string()];
        if let Some(oem) = self.oem {
            args.push("--oem".to_string());
            args.push(oem.to_string());
        }
        args.push("-c".to_string());
        args.push(format!("tessedit_char_whitelist={}", self.whitelist));
        args
    }
}

/// Turns a preprocessed field image into text.
///
/// `field` is only informational (logging, test doubles); implementations
/// must not change behavior based on it.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, field: FieldKey, img: &GrayImage, profile: &OcrProfile) -> Result<String>;
}

/// Runs the Tesseract executable once per field.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata: PathBuf,
}

impl TesseractCli {
    pub fn new(executable: PathBuf, tessdata: PathBuf) -> Self {
        Self {
            executable,
            tessdata,
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, field: FieldKey, img: &GrayImage, profile: &OcrProfile) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .with_context(|| format!("Failed to write OCR input for {}", field))?;

        // Run Tesseract to stdout
        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg("eng")
            .args(profile.args())
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed on {}: {}", field, stderr.trim()));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::debug!("OCR {}: '{}'", field, text);
        Ok(text)
    }
}
