//! Raster helpers shared by the face and liveness engines.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::domain::{KycError, Result};

/// Axis-aligned face region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole frame of a `width x height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Clip to the bounds of a `width x height` image. `None` when nothing
    /// of the box remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then_some(Self::new(self.x, self.y, w, h))
    }
}

/// Decode an image file. Missing and undecodable files are both `Decode`.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| KycError::Decode(format!("{}: {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| KycError::Decode(format!("{}: {e}", path.display())))?;
    reader
        .decode()
        .map_err(|e| KycError::Decode(format!("{}: {e}", path.display())))
}

/// Crop `region` out of `image`, convert to grayscale, and resize to a
/// `size x size` square.
pub fn normalized_face(image: &DynamicImage, region: BoundingBox, size: u32) -> Result<GrayImage> {
    let region = region
        .clamp_to(image.width(), image.height())
        .ok_or_else(|| {
            KycError::Validation(format!(
                "face region {region:?} lies outside {}x{} image",
                image.width(),
                image.height()
            ))
        })?;
    let crop = image.crop_imm(region.x, region.y, region.width, region.height);
    Ok(imageops::resize(
        &crop.to_luma8(),
        size,
        size,
        FilterType::Triangle,
    ))
}

/// Grayscale then Gaussian blur, used to suppress sensor noise before
/// frame differencing.
pub fn smoothed_gray(image: &DynamicImage, sigma: f32) -> GrayImage {
    let gray = image.to_luma8();
    if sigma > 0.0 {
        imageops::blur(&gray, sigma)
    } else {
        gray
    }
}

/// Sum of per-pixel absolute differences between two equally sized frames.
pub fn abs_diff_sum(a: &GrayImage, b: &GrayImage) -> u64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| u64::from(p.abs_diff(q)))
        .sum()
}
