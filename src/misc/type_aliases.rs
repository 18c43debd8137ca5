// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Type aliases for common types used all over the code base.

use nalgebra as na;

/// Depth grids and homographies are computed in f64.
/// Homography slopes go down to 1e-7 so f32 is not enough.
pub type Float = f64;

/// A vector with three Float coordinates.
pub type Vec3 = na::Vector3<Float>;

/// A 3x3 matrix of Floats.
pub type Mat3 = na::Matrix3<Float>;

/// A 2D grid of depth values, indexed by `(row, col)`.
/// Missing values are encoded with NaN.
pub type DepthMap = na::DMatrix<Float>;

/// An 8 bits RGB pixel.
pub type Rgb8 = (u8, u8, u8);

/// An RGB image stored as a matrix of pixels, indexed by `(y, x)`.
pub type RgbMat = na::DMatrix<Rgb8>;

/// A boolean mask, indexed by `(y, x)`.
pub type Mask = na::DMatrix<bool>;
