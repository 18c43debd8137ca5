// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Projection of depth cells into the IR and RGB sensors,
//! and warping of one sensor image into the frame of the other.
//!
//! Cells are traversed in row-major order. When several depth cells land
//! on the same destination pixel, the last one wins: there is no z-buffering,
//! so occlusions are not resolved.

use itertools::iproduct;
use nalgebra::{DMatrix, Scalar};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::homography::{self, Coefficients};
use crate::misc::type_aliases::{DepthMap, Float, Mask, Mat3, Vec3};

/// Pixel dimensions of a sensor image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub width: usize,
    pub height: usize,
}

impl SensorFrame {
    pub fn new(width: usize, height: usize) -> Self {
        SensorFrame { width, height }
    }

    /// Check that `(x, y)` is a pixel of the frame.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Round a floating point coordinate to the nearest pixel (ties to even),
    /// then clip it inside the frame.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn round_clip(&self, x: Float, y: Float) -> (usize, usize) {
        let clip = |v: Float, size: usize| v.round_ties_even().max(0.0).min(size as Float - 1.0);
        (clip(x, self.width) as usize, clip(y, self.height) as usize)
    }
}

/// Auxiliary sensors of the rig.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sensor {
    Ir,
    Rgb,
}

/// Pixel coordinates of one depth cell in both sensors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellMapping {
    /// 1-based row of the depth cell.
    pub row: usize,
    /// 1-based column of the depth cell.
    pub col: usize,
    /// Raw depth of the cell.
    pub z: Float,
    /// `(x, y)` in the IR image.
    pub ir: (usize, usize),
    /// `(x, y)` in the RGB image.
    pub rgb: (usize, usize),
}

impl CellMapping {
    pub fn coords(&self, sensor: Sensor) -> (usize, usize) {
        match sensor {
            Sensor::Ir => self.ir,
            Sensor::Rgb => self.rgb,
        }
    }
}

/// Calibration of one sensor relative to the depth grid.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorModel<'a> {
    pub frame: SensorFrame,
    pub coefficients: &'a Coefficients,
}

/// Apply a homography to the homogeneous point `(x, y, 1)`.
/// `None` if the result is at infinity.
pub fn apply(h: &Mat3, x: Float, y: Float) -> Option<(Float, Float)> {
    let p = h * Vec3::new(x, y, 1.0);
    if p.z == 0.0 || !p.z.is_finite() {
        return None;
    }
    let (u, v) = (p.x / p.z, p.y / p.z);
    if u.is_finite() && v.is_finite() {
        Some((u, v))
    } else {
        None
    }
}

/// Pixel of a sensor seeing the depth cell `(row, col)` (1-based) of depth `z`.
pub fn project_cell(model: &SensorModel, row: usize, col: usize, z: Float) -> Result<(usize, usize)> {
    let d = homography::depth_cm(z);
    model
        .coefficients
        .inverse_at_depth(d)
        .and_then(|h_inv| apply(&h_inv, col as Float, row as Float))
        .map(|(x, y)| model.frame.round_clip(x, y))
        .ok_or(Error::DegenerateProjection { row, col })
}

/// Result of projecting every cell of a dense depth grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Mapping {
    /// Mapped cells in row-major order.
    pub cells: Vec<CellMapping>,
    /// Number of cells skipped because a homography was degenerate.
    pub nb_degenerate: usize,
}

/// Project every cell of a dense depth grid into both sensors.
///
/// Cells with a degenerate projection are skipped, never fatal.
pub fn map_cells(dense: &DepthMap, ir: &SensorModel, rgb: &SensorModel) -> Mapping {
    let (nrows, ncols) = dense.shape();
    let mut cells = Vec::with_capacity(nrows * ncols);
    let mut nb_degenerate = 0;
    for (r, c) in iproduct!(0..nrows, 0..ncols) {
        let (row, col, z) = (r + 1, c + 1, dense[(r, c)]);
        let projected = project_cell(ir, row, col, z)
            .and_then(|ir_xy| project_cell(rgb, row, col, z).map(|rgb_xy| (ir_xy, rgb_xy)));
        match projected {
            Ok((ir, rgb)) => cells.push(CellMapping { row, col, z, ir, rgb }),
            Err(err) => {
                log::debug!("Skipping cell: {}", err);
                nb_degenerate += 1;
            }
        }
    }
    if nb_degenerate > 0 {
        log::warn!("{} depth cells had a degenerate projection", nb_degenerate);
    }
    log::info!("Mapped {} depth cells into both sensors", cells.len());
    Mapping {
        cells,
        nb_degenerate,
    }
}

/// Image being filled in the frame of a destination sensor,
/// with a mask of the pixels actually written.
#[derive(Clone, Debug, PartialEq)]
pub struct WarpedImage<T: Scalar> {
    /// Pixels indexed by `(y, x)`.
    pub pixels: DMatrix<T>,
    /// True where a pixel was written.
    pub valid: Mask,
}

impl<T: Scalar + Copy + Default> WarpedImage<T> {
    /// Default filled image with an empty mask.
    pub fn new(frame: SensorFrame) -> Self {
        WarpedImage {
            pixels: DMatrix::from_element(frame.height, frame.width, T::default()),
            valid: Mask::repeat(frame.height, frame.width, false),
        }
    }

    pub fn nb_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

/// Warp the image of the `from` sensor into the frame of the `to` sensor.
///
/// For every mapped cell whose coordinates are inside both frames
/// and whose source pixel is accepted by `accept(x, y)`,
/// the source pixel is copied at the destination pixel.
pub fn warp<T, F>(
    cells: &[CellMapping],
    source: &DMatrix<T>,
    from: Sensor,
    to: Sensor,
    to_frame: SensorFrame,
    accept: F,
) -> WarpedImage<T>
where
    T: Scalar + Copy + Default,
    F: Fn(usize, usize) -> bool,
{
    let from_frame = SensorFrame::new(source.ncols(), source.nrows());
    let mut warped = WarpedImage::new(to_frame);
    for cell in cells {
        let (sx, sy) = cell.coords(from);
        let (dx, dy) = cell.coords(to);
        if from_frame.contains(sx, sy) && to_frame.contains(dx, dy) && accept(sx, sy) {
            warped.pixels[(dy, dx)] = source[(sy, sx)];
            warped.valid[(dy, dx)] = true;
        }
    }
    warped
}

/// Acceptance predicate keeping IR pixels brighter than `threshold`.
/// Everything is accepted without threshold.
pub fn above_threshold(
    intensity: &DMatrix<u8>,
    threshold: Option<u8>,
) -> impl Fn(usize, usize) -> bool + '_ {
    move |x, y| threshold.map_or(true, |t| intensity[(y, x)] > t)
}

// TESTS #############################################################
