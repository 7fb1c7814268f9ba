//! Frame sources for text recognition and report screenshots.
//!
//! Grabbing pixels from the screen is left to an external capture tool; the
//! app reads the screenshot file that tool keeps up to date and crops the
//! requested region out of it.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::PathBuf;

use crate::automation::config::Region;

/// Supplies screen frames.
pub trait FrameSource: Send + Sync {
    /// Returns the given region of the current frame, or the whole frame.
    fn capture(&self, region: Option<&Region>) -> Result<RgbaImage>;
}

/// Reads frames from a screenshot file on disk.
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&self, region: Option<&Region>) -> Result<RgbaImage> {
        let img = image::open(&self.path)
            .with_context(|| format!("Failed to load frame {}", self.path.display()))?
            .to_rgba8();
        match region {
            Some(region) => crop_to_region(&img, region),
            None => Ok(img),
        }
    }
}

/// Crops a pixel region, clamped to the image bounds.
///
/// Fails if the region lies entirely outside the image.
pub fn crop_to_region(img: &RgbaImage, region: &Region) -> Result<RgbaImage> {
    let (w, h) = img.dimensions();

    let x0 = region.x.max(0) as u32;
    let y0 = region.y.max(0) as u32;
    if x0 >= w || y0 >= h {
        return Err(anyhow!(
            "Region ({}, {}) is outside the {}x{} frame",
            region.x,
            region.y,
            w,
            h
        ));
    }

    // Part of the region may sit left of/above the frame
    let skip_x = (x0 as i64 - region.x as i64) as u32;
    let skip_y = (y0 as i64 - region.y as i64) as u32;
    let rw = region.width.saturating_sub(skip_x).min(w - x0);
    let rh = region.height.saturating_sub(skip_y).min(h - y0);
    if rw == 0 || rh == 0 {
        return Err(anyhow!("Region is empty after clamping"));
    }

    Ok(image::imageops::crop_imm(img, x0, y0, rw, rh).to_image())
}
