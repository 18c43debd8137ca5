// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visualizations of aligned data.

use image::RgbImage;

use crate::core::depth_grid;
use crate::core::error::{Error, Result};
use crate::core::projection::WarpedImage;
use crate::misc::type_aliases::{DepthMap, Float, Rgb8, RgbMat};
use crate::misc::{colormap, helper, interop};

/// Number of intensity levels of the IR heat map.
pub const HEAT_LEVELS: u8 = 6;

/// Zero out intensities at or below `threshold`,
/// then quantize the others into `levels` bands of equal width.
#[allow(clippy::cast_possible_truncation)]
pub fn quantize(intensity: u8, threshold: u8, levels: u8) -> u8 {
    let step = 256 / u16::from(levels.max(1));
    if intensity > threshold {
        (u16::from(intensity) / step * step) as u8
    } else {
        0
    }
}

/// Heat map color of a quantized intensity, black for zero.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn heat_color(colormap: &[Rgb8], quantized: u8) -> Rgb8 {
    if quantized == 0 {
        return (0, 0, 0);
    }
    let idx = (Float::from(quantized) / 255.0 * colormap.len() as Float) as usize;
    colormap[idx.min(colormap.len() - 1)]
}

/// Overlay of the IR image warped into the RGB frame onto a gray version of the RGB image.
///
/// Warped IR pixels are drawn with a quantized inferno heat map,
/// the other pixels keep their gray level.
/// The result is blended half and half with the gray image.
pub fn ir_overlay(warped_ir: &WarpedImage<u8>, rgb: &RgbMat, threshold: u8) -> Result<RgbImage> {
    if warped_ir.pixels.shape() != rgb.shape() {
        return Err(Error::Dimension {
            expected: format!("{:?} RGB pixels", warped_ir.pixels.shape()),
            found: format!("{:?}", rgb.shape()),
        });
    }
    let inferno = colormap::inferno_u8();
    let gray = rgb.map(interop::luma);
    let blend = |a: u8, b: u8| ((u16::from(a) + u16::from(b)) / 2) as u8;
    let overlay = gray.zip_zip_map(&warped_ir.pixels, &warped_ir.valid, |g, ir, valid| {
        let (r, gr, b) = if valid {
            heat_color(&inferno, quantize(ir, threshold, HEAT_LEVELS))
        } else {
            (g, g, g)
        };
        (blend(r, g), blend(gr, g), blend(b, g))
    });
    Ok(interop::rgb_from_matrix(&overlay))
}

/// False color image of a depth grid.
///
/// Known depths are colored from the nearest (dark) to the farthest (bright).
/// Background cells are black and missing cells are white.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn depth_image(grid: &DepthMap) -> RgbImage {
    let inferno = colormap::inferno_u8();
    let range = helper::min_max(
        grid.iter()
            .map(|z| z.abs())
            .filter(|&z| depth_grid::is_known(z)),
    );
    let color = |z: Float| {
        if z.is_nan() {
            (255, 255, 255)
        } else if z == 0.0 {
            (0, 0, 0)
        } else {
            match range {
                Some((d_min, d_max)) if d_max > d_min => {
                    let idx = (255.0 * (z.abs() - d_min) / (d_max - d_min)).round();
                    inferno[idx.max(0.0).min(255.0) as usize]
                }
                _ => inferno[128],
            }
        }
    };
    interop::rgb_from_matrix(&grid.map(color))
}

// TESTS #############################################################
