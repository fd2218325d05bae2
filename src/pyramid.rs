//! Gaussian/Laplacian pyramid primitives.
//!
//! All arithmetic here is performed in float; conversion to/from
//! [`crate::image::ByteImage`] happens at the fusion engine's boundary.

use crate::image::{FloatImage, GrayImage};

/// Separable 5-tap binomial kernel `[1,4,6,4,1]/16`.
const KERNEL: [f64; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// A multi-resolution stack of 3-channel float images, level 0 full
/// resolution, decreasing thereafter.
pub type ColorPyramid = Vec<FloatImage>;

/// A multi-resolution stack of single-channel float images.
pub type GrayPyramid = Vec<GrayImage>;

/// Pick the pyramid depth for an image whose minimum spatial dimension is
/// `m`: `L = floor(log2(m)) - 2`, minimum 1.
pub fn pyramid_depth(min_dim: usize) -> usize {
    if min_dim < 1 {
        return 1;
    }
    let l = (min_dim as f64).log2().floor() as i64 - 2;
    l.max(1) as usize
}

/// Separable horizontal-then-vertical convolution with `KERNEL` (scaled by
/// `gain`), edge-replicated at the border. Operates per-channel.
fn convolve(width: usize, height: usize, channels: usize, data: &[f64], gain: f64) -> Vec<f64> {
    let clamp = |v: isize, max: usize| v.clamp(0, max as isize - 1) as usize;

    // Horizontal pass.
    let mut tmp = vec![0.0; width * height * channels];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, &w) in KERNEL.iter().enumerate() {
                    let dx = k as isize - 2;
                    let sx = clamp(x as isize + dx, width);
                    acc += w * data[(y * width + sx) * channels + c];
                }
                tmp[(y * width + x) * channels + c] = acc;
            }
        }
    }

    // Vertical pass.
    let mut out = vec![0.0; width * height * channels];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, &w) in KERNEL.iter().enumerate() {
                    let dy = k as isize - 2;
                    let sy = clamp(y as isize + dy, height);
                    acc += w * tmp[(sy * width + x) * channels + c];
                }
                out[(y * width + x) * channels + c] = acc * gain;
            }
        }
    }
    out
}

/// Gaussian blur followed by 2x decimation. Output dims `((h+1)/2, (w+1)/2)`.
pub fn downsample_color(img: &FloatImage) -> FloatImage {
    let blurred = convolve(img.width, img.height, 3, &img.data, 1.0);
    let ow = (img.width + 1) / 2;
    let oh = (img.height + 1) / 2;
    let mut data = vec![0.0; ow * oh * 3];
    for y in 0..oh {
        for x in 0..ow {
            for c in 0..3 {
                data[(y * ow + x) * 3 + c] = blurred[(2 * y * img.width + 2 * x) * 3 + c];
            }
        }
    }
    FloatImage { width: ow, height: oh, data }
}

pub fn downsample_gray(img: &GrayImage) -> GrayImage {
    let blurred = convolve(img.width, img.height, 1, &img.data, 1.0);
    let ow = (img.width + 1) / 2;
    let oh = (img.height + 1) / 2;
    let mut data = vec![0.0; ow * oh];
    for y in 0..oh {
        for x in 0..ow {
            data[y * ow + x] = blurred[2 * y * img.width + 2 * x];
        }
    }
    GrayImage { width: ow, height: oh, data }
}

/// 2x zero-insert followed by Gaussian blur scaled by 4 to compensate for
/// the inserted zeros. `(dst_h, dst_w)` lets the caller match an odd-sized
/// original exactly.
pub fn upsample_color(img: &FloatImage, dst_h: usize, dst_w: usize) -> FloatImage {
    let iw = img.width * 2;
    let ih = img.height * 2;
    let mut zeroed = vec![0.0; iw * ih * 3];
    for y in 0..img.height {
        for x in 0..img.width {
            for c in 0..3 {
                zeroed[(2 * y * iw + 2 * x) * 3 + c] = img.data[(y * img.width + x) * 3 + c];
            }
        }
    }
    let blurred = convolve(iw, ih, 3, &zeroed, 4.0);
    crop_or_pad_color(&blurred, iw, ih, dst_h, dst_w)
}

pub fn upsample_gray(img: &GrayImage, dst_h: usize, dst_w: usize) -> GrayImage {
    let iw = img.width * 2;
    let ih = img.height * 2;
    let mut zeroed = vec![0.0; iw * ih];
    for y in 0..img.height {
        for x in 0..img.width {
            zeroed[2 * y * iw + 2 * x] = img.data[y * img.width + x];
        }
    }
    let blurred = convolve(iw, ih, 1, &zeroed, 4.0);
    crop_or_pad_gray(&blurred, iw, ih, dst_h, dst_w)
}

fn crop_or_pad_color(data: &[f64], w: usize, h: usize, dst_h: usize, dst_w: usize) -> FloatImage {
    let mut out = vec![0.0; dst_w * dst_h * 3];
    for y in 0..dst_h {
        let sy = y.min(h - 1);
        for x in 0..dst_w {
            let sx = x.min(w - 1);
            for c in 0..3 {
                out[(y * dst_w + x) * 3 + c] = data[(sy * w + sx) * 3 + c];
            }
        }
    }
    FloatImage { width: dst_w, height: dst_h, data: out }
}

fn crop_or_pad_gray(data: &[f64], w: usize, h: usize, dst_h: usize, dst_w: usize) -> GrayImage {
    let mut out = vec![0.0; dst_w * dst_h];
    for y in 0..dst_h {
        let sy = y.min(h - 1);
        for x in 0..dst_w {
            let sx = x.min(w - 1);
            out[y * dst_w + x] = data[sy * w + sx];
        }
    }
    GrayImage { width: dst_w, height: dst_h, data: out }
}

/// Build a Gaussian pyramid of at most `depth` levels, stopping early if
/// either spatial dimension would fall below 2.
pub fn gaussian_pyramid_color(img: &FloatImage, depth: usize) -> ColorPyramid {
    let mut levels = vec![img.clone()];
    for _ in 1..depth {
        let prev = levels.last().expect("non-empty pyramid");
        if prev.width < 2 || prev.height < 2 {
            break;
        }
        levels.push(downsample_color(prev));
    }
    levels
}

pub fn gaussian_pyramid_gray(img: &GrayImage, depth: usize) -> GrayPyramid {
    let mut levels = vec![img.clone()];
    for _ in 1..depth {
        let prev = levels.last().expect("non-empty pyramid");
        if prev.width < 2 || prev.height < 2 {
            break;
        }
        levels.push(downsample_gray(prev));
    }
    levels
}

/// Laplacian pyramid: bandpass residuals for levels `0..L-2`, coarsest
/// Gaussian at level `L-1`.
pub fn laplacian_pyramid(img: &FloatImage, depth: usize) -> ColorPyramid {
    let gauss = gaussian_pyramid_color(img, depth);
    let n = gauss.len();
    let mut levels = Vec::with_capacity(n);
    for k in 0..n.saturating_sub(1) {
        let (h, w) = gauss[k].shape();
        let expanded = upsample_color(&gauss[k + 1], h, w);
        let mut residual = gauss[k].clone();
        for (r, e) in residual.data.iter_mut().zip(expanded.data.iter()) {
            *r -= e;
        }
        levels.push(residual);
    }
    if let Some(last) = gauss.last() {
        levels.push(last.clone());
    }
    levels
}

/// Reconstruct an image from its Laplacian pyramid.
pub fn reconstruct(levels: &[FloatImage]) -> FloatImage {
    let mut img = levels
        .last()
        .cloned()
        .unwrap_or_else(|| FloatImage::zeros(1, 1));
    for k in (0..levels.len().saturating_sub(1)).rev() {
        let (h, w) = levels[k].shape();
        let expanded = upsample_color(&img, h, w);
        let mut next = levels[k].clone();
        for (n, e) in next.data.iter_mut().zip(expanded.data.iter()) {
            *n += e;
        }
        img = next;
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_image(w: usize, h: usize) -> FloatImage {
        let mut data = vec![0.0; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let v = (x + y) as f64 / (w + h) as f64;
                for c in 0..3 {
                    data[(y * w + x) * 3 + c] = v;
                }
            }
        }
        FloatImage::new(w, h, data)
    }

    #[test]
    fn depth_selection_matches_formula() {
        assert_eq!(pyramid_depth(64), 4);
        assert_eq!(pyramid_depth(16), 2);
        assert_eq!(pyramid_depth(1), 1);
        assert_eq!(pyramid_depth(4), 1);
    }

    #[test]
    fn reconstruction_matches_original_within_tolerance() {
        let img = ramp_image(33, 29);
        let depth = pyramid_depth(29.min(33));
        let pyr = laplacian_pyramid(&img, depth);
        let out = reconstruct(&pyr);
        assert_eq!(out.shape(), img.shape());
        let max_err = img
            .data
            .iter()
            .zip(out.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_err <= 1e-6, "max_err={max_err}");
    }

    #[test]
    fn downsample_halves_dimensions_rounding_up() {
        let img = ramp_image(33, 17);
        let down = downsample_color(&img);
        assert_eq!(down.shape(), (9, 17));
    }
}
