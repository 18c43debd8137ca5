// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Core functionalities of the depth-aware alignment.

pub mod depth_grid;
pub mod error;
pub mod gap_fill;
pub mod homography;
pub mod interpolation;
pub mod pipeline;
pub mod point_cloud;
pub mod projection;
