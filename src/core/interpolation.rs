// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Edge-aware filling of missing depth values.
//!
//! Each cell becomes the average of its window, weighted by both
//! the spatial distance to the center and the depth difference with a reference value.
//! Neighbors on the other side of a depth discontinuity get a negligible weight,
//! so edges are not blurred.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::math::distance_transform;
use crate::misc::type_aliases::{DepthMap, Float};

/// Parameters of the edge-aware interpolation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Standard deviation of the spatial gaussian, in pixels.
    pub spatial_sigma: Float,
    /// Standard deviation of the depth gaussian, in depth units.
    pub depth_sigma: Float,
    /// Side of the square window. Must be odd.
    pub window_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            spatial_sigma: 1.0,
            depth_sigma: 0.05,
            window_size: 3,
        }
    }
}

impl Params {
    /// Precompute the spatial weights of the window, row-major.
    pub fn spatial_weights(&self) -> Vec<Float> {
        let half = (self.window_size / 2) as isize;
        let two_sigma_2 = 2.0 * self.spatial_sigma * self.spatial_sigma;
        let mut weights = Vec::with_capacity(self.window_size * self.window_size);
        for dy in -half..=half {
            for dx in -half..=half {
                let d2 = (dx * dx + dy * dy) as Float;
                weights.push((-d2 / two_sigma_2).exp());
            }
        }
        weights
    }
}

/// Mirror an out of range index back into `0..n`, without repeating the edge.
///
/// For `n = 4`: `-2 -> 2`, `-1 -> 1`, `4 -> 2`, `5 -> 1`.
pub fn reflect_index(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    if i < n as isize {
        i as usize
    } else {
        (period - i) as usize
    }
}

/// Interpolated value of one cell.
///
/// Returns `None` if the cell is missing and its whole window is missing.
/// Such residual gaps are handled by `fill`.
pub fn interpolate_cell(
    grid: &DepthMap,
    row: usize,
    col: usize,
    params: &Params,
    spatial_weights: &[Float],
) -> Option<Float> {
    let value = grid[(row, col)];
    if value == 0.0 {
        return Some(0.0);
    }

    let (nrows, ncols) = grid.shape();
    let half = (params.window_size / 2) as isize;
    let window = || {
        (-half..=half).flat_map(move |dy| {
            (-half..=half).map(move |dx| {
                let r = reflect_index(row as isize + dy, nrows);
                let c = reflect_index(col as isize + dx, ncols);
                grid[(r, c)]
            })
        })
    };

    let reference = if value.is_finite() {
        value
    } else {
        let (sum, count) = window()
            .filter(|v| v.is_finite())
            .fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            return None;
        }
        sum / count as Float
    };

    let two_sigma_2 = 2.0 * params.depth_sigma * params.depth_sigma;
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (v, spatial) in window().zip(spatial_weights) {
        if v.is_finite() {
            let diff = v - reference;
            let weight = spatial * (-(diff * diff) / two_sigma_2).exp();
            weighted_sum += weight * v;
            total_weight += weight;
        }
    }

    if total_weight > 0.0 {
        Some(weighted_sum / total_weight)
    } else {
        Some(reference)
    }
}

/// Edge-aware interpolation of every cell, leaving residual gaps missing.
pub fn interpolate(grid: &DepthMap, params: &Params) -> DepthMap {
    let spatial_weights = params.spatial_weights();
    let (nrows, ncols) = grid.shape();
    DMatrix::from_fn(nrows, ncols, |r, c| {
        interpolate_cell(grid, r, c, params, &spatial_weights).unwrap_or(Float::NAN)
    })
}

/// Edge-aware interpolation producing a dense grid.
///
/// Residual gaps take the value of the nearest finite cell.
/// If no cell is finite at all, they fall back to zero.
pub fn fill(grid: &DepthMap, params: &Params) -> DepthMap {
    let interpolated = interpolate(grid, params);
    let nb_gaps = interpolated.iter().filter(|z| z.is_nan()).count();
    if nb_gaps == 0 {
        return interpolated;
    }
    log::debug!("{} residual gaps after interpolation", nb_gaps);
    let finite = interpolated.map(|z| z.is_finite());
    match distance_transform::nearest_indices(&finite) {
        Some(nearest) => interpolated.zip_map(&nearest, |z, idx| {
            if z.is_finite() {
                z
            } else {
                interpolated[idx]
            }
        }),
        None => {
            log::warn!("Depth grid has no finite value, filling with zeros");
            interpolated.map(|_| 0.0)
        }
    }
}

// TESTS #############################################################
