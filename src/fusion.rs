//! Exposure-bracketed multi-frame fusion engine.
//!
//! Combines a bracket of differently exposed [`ByteImage`]s into a single
//! composite using the quality-weighted Laplacian-pyramid blend described
//! in the quality and pyramid modules.

use crate::error::FusionError;
use crate::image::ByteImage;
use crate::pyramid::{self, pyramid_depth};
use crate::quality::{self, QualityWeights};

/// Fuse a bracket of byte images into one composite.
///
/// An empty bracket is rejected with `Err(FusionError::EmptyBracket)`
/// rather than silently returning a blank frame.
pub fn fuse(bracket: &[ByteImage], weights: QualityWeights) -> Result<ByteImage, FusionError> {
    if bracket.is_empty() {
        return Err(FusionError::EmptyBracket);
    }

    let (h0, w0) = bracket[0].shape();
    for img in bracket {
        if img.shape() != (h0, w0) {
            return Err(FusionError::ShapeMismatch);
        }
    }

    let float_images: Vec<_> = bracket.iter().map(|b| b.to_float()).collect();
    for f in &float_images {
        if !f.is_finite() {
            return Err(FusionError::NonFiniteInput);
        }
    }

    let depth = pyramid_depth(h0.min(w0));
    let weight_maps = quality::bracket_weight_maps(&float_images, weights);

    let laplacians: Vec<_> = float_images
        .iter()
        .map(|f| pyramid::laplacian_pyramid(f, depth))
        .collect();
    let weight_pyramids: Vec<_> = weight_maps
        .iter()
        .map(|w| pyramid::gaussian_pyramid_gray(w, depth))
        .collect();

    let levels = laplacians[0].len();
    let mut fused_levels = Vec::with_capacity(levels);
    for k in 0..levels {
        let (h, w) = laplacians[0][k].shape();
        let mut acc = crate::image::FloatImage::zeros(w, h);
        for i in 0..bracket.len() {
            let wk = weight_pyramids[i][k].broadcast3();
            let lk = &laplacians[i][k];
            for (a, (wv, lv)) in acc.data.iter_mut().zip(wk.data.iter().zip(lk.data.iter())) {
                *a += wv * lv;
            }
        }
        fused_levels.push(acc);
    }

    let reconstructed = pyramid::reconstruct(&fused_levels);
    Ok(reconstructed.to_byte_image())
}
