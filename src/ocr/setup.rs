//! Locating the Tesseract binary and its English language data.

use anyhow::{anyhow, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENG_TRAINEDDATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin"];

#[cfg(windows)]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Finds the Tesseract executable, checking our local dir first, then PATH,
/// then common install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_INSTALL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(EXE_NAME))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a directory holding eng.traineddata.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_eng(&local_tessdata) {
        return Ok(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_eng(&p) {
            return Ok(p);
        }
        let p = p.join("tessdata");
        if has_eng(&p) {
            return Ok(p);
        }
    }

    SYSTEM_TESSDATA_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| has_eng(p))
        .ok_or_else(|| {
            anyhow!("tessdata directory not found. Please ensure eng.traineddata is available.")
        })
}

fn has_eng(dir: &Path) -> bool {
    dir.join(ENG_TRAINEDDATA).exists()
}

/// Makes sure English language data is available, downloading it into the
/// local tessdata directory if no copy exists anywhere.
pub fn ensure_tessdata() -> Result<PathBuf> {
    if let Ok(dir) = find_tessdata_dir() {
        log(&format!("Tessdata found at: {}", dir.display()));
        return Ok(dir);
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)?;
    download_tessdata(&tessdata_dir)?;
    Ok(tessdata_dir)
}

fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);

    log("Downloading eng.traineddata...");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "forge-companion")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded eng.traineddata ({} bytes)", bytes.len()));

    Ok(())
}
