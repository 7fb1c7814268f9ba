use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::automation::config::Region;
use crate::capture::FrameSource;

/// Reads the text currently shown on screen.
pub trait TextRecognizer: Send + Sync {
    /// Recognizes text in a screen region, or the whole screen for `None`.
    fn recognize(&self, region: Option<&Region>) -> Result<String>;
}

/// Runs the Tesseract CLI on frames from a [`FrameSource`].
pub struct TesseractRecognizer {
    frames: Arc<dyn FrameSource>,
    psm: u8,
}

impl TesseractRecognizer {
    pub fn new(frames: Arc<dyn FrameSource>, psm: u8) -> Self {
        Self { frames, psm }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, region: Option<&Region>) -> Result<String> {
        let img = self.frames.capture(region)?;
        let tesseract_exe = find_tesseract_executable()?;
        let tessdata_dir = find_tessdata_dir()?;
        recognize_image(&img, &tesseract_exe, &tessdata_dir, self.psm)
    }
}

/// Runs Tesseract on an image and returns the raw text.
pub fn recognize_image(
    img: &RgbaImage,
    tesseract_exe: &Path,
    tessdata_dir: &Path,
    psm: u8,
) -> Result<String> {
    // Tesseract only takes file input
    let temp_input = NamedTempFile::with_suffix(".png")?;
    img.save(temp_input.path())
        .context("Failed to write OCR input image")?;

    let output = Command::new(tesseract_exe)
        .arg(temp_input.path())
        .arg("stdout")
        .arg("--tessdata-dir")
        .arg(tessdata_dir)
        .arg("-l")
        .arg("eng")
        .arg("--psm")
        .arg(psm.to_string())
        .output()
        .with_context(|| format!("Failed to run {}", tesseract_exe.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Tesseract failed: {}", stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
