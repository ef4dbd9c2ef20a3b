//! Local binary pattern histogram (LBPH) face recognizer.
//!
//! Each pixel is encoded by comparing it with its eight neighbours, the
//! code image is split into a grid, and every cell contributes a 256-bin
//! histogram normalised to sum 1. Faces are compared with the alternative
//! chi-square distance, so identical faces score 0 and the distance grows
//! without a fixed upper bound in practice.

use image::GrayImage;

use crate::domain::{KycError, Result};

const BINS: usize = 256;

/// Neighbour offsets, clockwise from the top-left. Bit 7 is the first.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// 3x3 local binary pattern codes for every interior pixel. The output is
/// two pixels narrower and shorter than the input.
pub fn lbp_codes(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return GrayImage::new(0, 0);
    }
    GrayImage::from_fn(w - 2, h - 2, |x, y| {
        let (cx, cy) = (x as i32 + 1, y as i32 + 1);
        let center = image.get_pixel(cx as u32, cy as u32)[0];
        let code = NEIGHBOURS
            .iter()
            .enumerate()
            .fold(0u8, |code, (i, &(dx, dy))| {
                let n = image.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0];
                if n >= center {
                    code | (1 << (7 - i))
                } else {
                    code
                }
            });
        image::Luma([code])
    })
}

/// Concatenated per-cell histograms of `codes` over a `grid_x x grid_y` grid.
pub fn spatial_histogram(codes: &GrayImage, grid_x: u32, grid_y: u32) -> Result<Vec<f64>> {
    let (w, h) = codes.dimensions();
    if grid_x == 0 || grid_y == 0 || w < grid_x || h < grid_y {
        return Err(KycError::Validation(format!(
            "{grid_x}x{grid_y} grid does not fit {w}x{h} pattern image"
        )));
    }
    let (cell_w, cell_h) = (w / grid_x, h / grid_y);
    let cell_total = f64::from(cell_w * cell_h);

    let mut out = vec![0.0; (grid_x * grid_y) as usize * BINS];
    for gy in 0..grid_y {
        for gx in 0..grid_x {
            let cell = &mut out[((gy * grid_x + gx) as usize) * BINS..][..BINS];
            for y in gy * cell_h..(gy + 1) * cell_h {
                for x in gx * cell_w..(gx + 1) * cell_w {
                    cell[codes.get_pixel(x, y)[0] as usize] += 1.0;
                }
            }
            cell.iter_mut().for_each(|bin| *bin /= cell_total);
        }
    }
    Ok(out)
}

/// Alternative chi-square: `sum 2 (a - b)^2 / (a + b)` over non-empty bins.
pub fn chi_square_alt(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|&(&x, &y)| x + y > 0.0)
        .map(|(&x, &y)| 2.0 * (x - y) * (x - y) / (x + y))
        .sum()
}

/// LBPH model over a set of labelled training faces.
///
/// Built fresh for each comparison; it carries no state beyond the
/// histograms of the faces it was trained on.
#[derive(Debug, Clone)]
pub struct LbphRecognizer {
    grid_x: u32,
    grid_y: u32,
    histograms: Vec<(i32, Vec<f64>)>,
}

impl LbphRecognizer {
    /// Train on `(label, face)` pairs. All faces should share one size.
    pub fn train(samples: &[(i32, &GrayImage)], grid_x: u32, grid_y: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(KycError::Validation(
                "LBPH training needs at least one face".to_string(),
            ));
        }
        let histograms = samples
            .iter()
            .map(|&(label, face)| Ok((label, spatial_histogram(&lbp_codes(face), grid_x, grid_y)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            grid_x,
            grid_y,
            histograms,
        })
    }

    /// Nearest training label and its raw distance ("confidence"; lower is
    /// closer).
    pub fn predict(&self, face: &GrayImage) -> Result<(i32, f64)> {
        let query = spatial_histogram(&lbp_codes(face), self.grid_x, self.grid_y)?;
        self.histograms
            .iter()
            .filter(|(_, h)| h.len() == query.len())
            .map(|(label, h)| (*label, chi_square_alt(h, &query)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| {
                KycError::Validation("probe face size differs from training faces".to_string())
            })
    }
}
