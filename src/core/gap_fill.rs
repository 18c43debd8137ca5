// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Nearest neighbor inpainting of warped images.

use nalgebra::{DMatrix, Scalar};

use crate::core::error::{Error, Result};
use crate::core::projection::WarpedImage;
use crate::math::distance_transform;

/// Give every invalid pixel the value of the nearest valid pixel (Euclidean distance).
///
/// Fails with `EmptyMask` if no pixel is valid.
pub fn fill_nearest<T: Scalar + Copy>(warped: &WarpedImage<T>) -> Result<DMatrix<T>> {
    let nearest = distance_transform::nearest_indices(&warped.valid).ok_or(Error::EmptyMask)?;
    Ok(warped
        .pixels
        .zip_zip_map(&warped.valid, &nearest, |pixel, valid, idx| {
            if valid {
                pixel
            } else {
                warped.pixels[idx]
            }
        }))
}

/// Same as `fill_nearest`, but an empty mask produces an all-default (zero) image.
pub fn fill_nearest_or_default<T: Scalar + Copy + Default>(warped: &WarpedImage<T>) -> DMatrix<T> {
    fill_nearest(warped).unwrap_or_else(|_| {
        log::warn!("Nothing to propagate in warped image, producing an empty image");
        warped.pixels.map(|_| T::default())
    })
}

// TESTS #############################################################
