use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::engine::TesseractCli;
use crate::config::OcrConfig;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const TRAINEDDATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXE_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXE_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Ensures Tesseract and English trained data are available.
///
/// The executable must already be installed. Trained data is downloaded into
/// the bundled tessdata directory when no installed copy is found.
pub fn ensure_tesseract(config: &OcrConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config)?;
    log::info!("Tesseract executable: {}", executable.display());

    let tessdata = match find_tessdata_dir(config) {
        Ok(dir) => dir,
        Err(e) => {
            log::warn!("{}", e);
            let local = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&local)
                .with_context(|| format!("Failed to create {}", local.display()))?;
            download_tessdata(&local)?;
            local
        }
    };
    log::info!("Tesseract ready, tessdata at: {}", tessdata.display());

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Builds the OCR engine from discovered paths.
pub fn tesseract_engine(config: &OcrConfig) -> Result<TesseractCli> {
    let paths = ensure_tesseract(config)?;
    Ok(TesseractCli::new(paths.executable, paths.tessdata))
}

fn responds_to_version(executable: &Path) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable.
///
/// Order: configured path, bundled `<exe_dir>/tesseract/`, PATH, common
/// install locations.
pub fn find_tesseract_executable(config: &OcrConfig) -> Result<PathBuf> {
    if let Some(path) = &config.tesseract_path {
        if path.exists() {
            return Ok(path.clone());
        }
        log::warn!(
            "Configured tesseract_path {} does not exist, searching elsewhere",
            path.display()
        );
    }

    let local_exe = get_tesseract_dir().join(EXE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    let on_path = PathBuf::from("tesseract");
    if responds_to_version(&on_path) {
        return Ok(on_path);
    }

    for path in COMMON_EXE_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH, or copy it to: {}",
        get_tesseract_dir().display()
    ))
}

fn has_traineddata(dir: &Path) -> bool {
    dir.join(TRAINEDDATA).exists()
}

/// Finds a tessdata directory containing eng.traineddata.
///
/// Order: configured directory, `TESSDATA_PREFIX`, bundled
/// `<exe_dir>/tesseract/tessdata/`, system install locations.
pub fn find_tessdata_dir(config: &OcrConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.tessdata_dir {
        if has_traineddata(dir) {
            return Ok(dir.clone());
        }
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_traineddata(&p) {
            return Ok(p);
        }
        let p = p.join("tessdata");
        if has_traineddata(&p) {
            return Ok(p);
        }
    }

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_traineddata(&local_tessdata) {
        return Ok(local_tessdata);
    }

    for path in SYSTEM_TESSDATA_PATHS {
        let p = PathBuf::from(path);
        if has_traineddata(&p) {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {} is available.",
        TRAINEDDATA
    ))
}

/// Downloads English trained data into `tessdata_dir`.
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, TRAINEDDATA);
    let eng_path = tessdata_dir.join(TRAINEDDATA);

    log::info!("Downloading {}...", TRAINEDDATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "platina-archive")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)
        .with_context(|| format!("Failed to create {}", eng_path.display()))?;
    file.write_all(&bytes)?;

    log::info!("Downloaded {} ({} bytes)", TRAINEDDATA, bytes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_configured_tessdata_dir_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TRAINEDDATA), b"stub").unwrap();

        let config = OcrConfig {
            tessdata_dir: Some(dir.path().to_path_buf()),
            ..OcrConfig::default()
        };
        assert_eq!(find_tessdata_dir(&config).unwrap(), dir.path());
    }

    #[test]
    fn test_configured_executable_wins() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join(EXE_NAME);
        fs::write(&exe, b"").unwrap();

        let config = OcrConfig {
            tesseract_path: Some(exe.clone()),
            ..OcrConfig::default()
        };
        assert_eq!(find_tesseract_executable(&config).unwrap(), exe);
    }

    #[test]
    fn test_has_traineddata() {
        let dir = tempdir().unwrap();
        assert!(!has_traineddata(dir.path()));
        fs::write(dir.path().join(TRAINEDDATA), b"stub").unwrap();
        assert!(has_traineddata(dir.path()));
    }
}
