// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # Depth-aware alignment of ToF, IR and RGB captures
//!
//! A time-of-flight sensor provides a point cloud, one record per depth pixel.
//! This crate turns it into a dense depth grid and uses a homography model
//! whose coefficients vary linearly with depth to find, for every depth pixel,
//! the matching pixels of an IR camera and an RGB camera.
//! The IR image can then be warped into the RGB frame and vice versa.
//!
//! The main steps are:
//!
//! 1. `core::point_cloud`: read the binary point cloud.
//! 2. `core::depth_grid`: place samples in a grid and reject outliers.
//! 3. `core::interpolation`: fill missing depths without blurring edges.
//! 4. `core::homography` and `core::projection`: map depth pixels into the sensors
//!    and warp images.
//! 5. `core::gap_fill`: complete warped images with their nearest valid pixels.
//!
//! `core::pipeline` chains all of them from a `PipelineConfig`.
//! Calibration constants and text formats of the capture rig
//! live in `dataset::blaze`.

pub mod core;
pub mod dataset;
pub mod math;
pub mod misc;
