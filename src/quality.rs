//! Per-pixel quality maps used to weight a bracket during fusion.

use crate::image::{FloatImage, GrayImage};

const EPSILON: f64 = 1e-12;
const WELL_EXPOSED_SIGMA: f64 = 0.2;

/// Weight exponents applied to contrast, saturation, well-exposedness.
#[derive(Clone, Copy, Debug)]
pub struct QualityWeights {
    pub contrast: f64,
    pub saturation: f64,
    pub well_exposedness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self { contrast: 1.0, saturation: 1.0, well_exposedness: 1.0 }
    }
}

/// `|Laplacian(gray(I))|` using the standard 4-neighbor kernel
/// `[[0,1,0],[1,-4,1],[0,1,0]]`.
pub fn contrast(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayImage::zeros(w, h);
    for y in 0..h {
        for x in 0..w {
            let c = gray.at(y, x);
            let up = gray.at_clamped(y as isize - 1, x as isize);
            let down = gray.at_clamped(y as isize + 1, x as isize);
            let left = gray.at_clamped(y as isize, x as isize - 1);
            let right = gray.at_clamped(y as isize, x as isize + 1);
            let lap = up + down + left + right - 4.0 * c;
            out.data[y * w + x] = lap.abs();
        }
    }
    out
}

/// Population standard deviation across the 3 channels at each pixel.
pub fn saturation(img: &FloatImage) -> GrayImage {
    let (w, h) = (img.width, img.height);
    let mut out = GrayImage::zeros(w, h);
    for y in 0..h {
        for x in 0..w {
            let [b, g, r] = img.pixel(y, x);
            let mean = (b + g + r) / 3.0;
            let var = ((b - mean).powi(2) + (g - mean).powi(2) + (r - mean).powi(2)) / 3.0;
            out.data[y * w + x] = var.sqrt();
        }
    }
    out
}

/// `Π_c exp(-0.5 (I_c - 0.5)^2 / σ^2)` with `σ = 0.2`.
pub fn well_exposedness(img: &FloatImage) -> GrayImage {
    let (w, h) = (img.width, img.height);
    let mut out = GrayImage::zeros(w, h);
    let sigma2 = WELL_EXPOSED_SIGMA * WELL_EXPOSED_SIGMA;
    for y in 0..h {
        for x in 0..w {
            let [b, g, r] = img.pixel(y, x);
            let mut score = 1.0;
            for c in [b, g, r] {
                score *= (-0.5 * (c - 0.5).powi(2) / sigma2).exp();
            }
            out.data[y * w + x] = score;
        }
    }
    out
}

/// Unnormalized weight for one bracket image: `C^wc * S^ws * E^we + eps`.
pub fn raw_weight(float_img: &FloatImage, weights: QualityWeights) -> GrayImage {
    let gray = float_img.grayscale();
    let c = contrast(&gray);
    let s = saturation(float_img);
    let e = well_exposedness(float_img);

    let (w, h) = (float_img.width, float_img.height);
    let mut out = GrayImage::zeros(w, h);
    for i in 0..(w * h) {
        let val = c.data[i].powf(weights.contrast)
            * s.data[i].powf(weights.saturation)
            * e.data[i].powf(weights.well_exposedness)
            + EPSILON;
        out.data[i] = val;
    }
    out
}

/// Normalize a bracket's raw weight maps so they sum to 1 at every pixel.
pub fn normalize_weights(raw: &[GrayImage]) -> Vec<GrayImage> {
    if raw.is_empty() {
        return Vec::new();
    }
    let (w, h) = (raw[0].width, raw[0].height);
    let n = w * h;

    let mut sums = vec![0.0; n];
    for map in raw {
        for i in 0..n {
            sums[i] += map.data[i];
        }
    }

    raw.iter()
        .map(|map| {
            let data = map
                .data
                .iter()
                .zip(sums.iter())
                .map(|(&v, &s)| if s > 0.0 { v / s } else { 1.0 / raw.len() as f64 })
                .collect();
            GrayImage { width: w, height: h, data }
        })
        .collect()
}

/// Compute normalized weight maps for an entire bracket of float images.
pub fn bracket_weight_maps(images: &[FloatImage], weights: QualityWeights) -> Vec<GrayImage> {
    let raw: Vec<GrayImage> = images.iter().map(|img| raw_weight(img, weights)).collect();
    normalize_weights(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(w: usize, h: usize, v: f64) -> FloatImage {
        FloatImage::new(w, h, vec![v; w * h * 3])
    }

    #[test]
    fn weight_maps_sum_to_one() {
        let images = vec![flat(16, 16, 0.2), flat(16, 16, 0.5), flat(16, 16, 0.9)];
        let maps = bracket_weight_maps(&images, QualityWeights::default());
        for i in 0..(16 * 16) {
            let sum: f64 = maps.iter().map(|m| m.data[i]).sum();
            assert!((sum - 1.0).abs() <= 1e-6, "sum={sum}");
        }
    }

    #[test]
    fn well_exposedness_peaks_at_midgrey() {
        let mid = flat(4, 4, 0.5);
        let dark = flat(4, 4, 0.05);
        let we_mid = well_exposedness(&mid);
        let we_dark = well_exposedness(&dark);
        assert!(we_mid.data[0] > we_dark.data[0]);
    }

    #[test]
    fn single_image_bracket_weight_is_one() {
        let images = vec![flat(8, 8, 0.3)];
        let maps = bracket_weight_maps(&images, QualityWeights::default());
        assert_eq!(maps.len(), 1);
        for &v in &maps[0].data {
            assert!((v - 1.0).abs() <= 1e-9);
        }
    }
}
