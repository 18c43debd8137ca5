// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Full alignment of one capture: point cloud to dense depth,
//! then depth-aware warping of the IR and RGB images into each other's frame.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::depth_grid::{self, OutlierFilter};
use crate::core::error::{AtStage, Error, Result, RunError, Stage};
use crate::core::gap_fill;
use crate::core::homography::Coefficients;
use crate::core::interpolation::{self, Params};
use crate::core::point_cloud::{self, PointSample};
use crate::core::projection::{self, Mapping, Sensor, SensorFrame, SensorModel, WarpedImage};
use crate::dataset::blaze;
use crate::misc::interop;
use crate::misc::type_aliases::{DepthMap, Float, Rgb8, RgbMat};
use crate::misc::view;

/// File names of the outputs written by `write_outputs`.
pub mod file_names {
    pub const RAW_DEPTH: &str = "row_col_z.txt";
    pub const DENSE_DEPTH: &str = "interpolated_z.txt";
    pub const MAPPING: &str = "depth_to_ir_rgb_mapping.txt";
    pub const IR_IN_RGB: &str = "warped_ir_aligned_to_rgb.png";
    pub const RGB_IN_IR: &str = "warped_rgb_aligned_to_ir.png";
    pub const OVERLAY: &str = "overlay_ir_rgb_grayscale_bg.png";
    pub const DEPTH_COLORS: &str = "depth_false_color.png";
}

/// Configuration of the alignment.
/// Missing fields of a JSON configuration take their default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resolution of the depth sensor.
    pub depth_frame: SensorFrame,
    /// Resolution of the IR camera.
    pub ir_frame: SensorFrame,
    /// Resolution of the RGB camera.
    pub rgb_frame: SensorFrame,
    /// Outlier rejection, disabled with `None`.
    pub outlier_filter: Option<OutlierFilter>,
    pub interpolation: Params,
    /// IR pixels at or below this intensity are not warped into the RGB frame.
    pub ir_threshold: Option<u8>,
    pub ir_coefficients: Coefficients,
    pub rgb_coefficients: Coefficients,
    /// Require exactly one record per depth pixel.
    pub require_full_cloud: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            depth_frame: blaze::DEPTH_FRAME,
            ir_frame: blaze::IR_FRAME,
            rgb_frame: blaze::RGB_FRAME,
            outlier_filter: Some(OutlierFilter::default()),
            interpolation: Params::default(),
            ir_threshold: Some(blaze::IR_THRESHOLD),
            ir_coefficients: blaze::ir_coefficients(),
            rgb_coefficients: blaze::rgb_coefficients(),
            require_full_cloud: false,
        }
    }
}

/// Everything computed by a run.
#[derive(Clone, Debug)]
pub struct Output {
    /// Depth grid after outlier rejection.
    pub raw_depth: DepthMap,
    /// Percentile band used by the outlier rejection.
    pub outlier_bounds: Option<(Float, Float)>,
    /// Interpolated depth grid, without missing value.
    pub dense_depth: DepthMap,
    pub mapping: Mapping,
    /// IR intensities warped into the RGB frame, before gap filling.
    pub ir_in_rgb: WarpedImage<u8>,
    /// IR intensities aligned with the RGB image.
    pub aligned_ir: DMatrix<u8>,
    /// RGB colors warped into the IR frame, before gap filling.
    pub rgb_in_ir: WarpedImage<Rgb8>,
    /// RGB colors aligned with the IR image.
    pub aligned_rgb: RgbMat,
}

impl PipelineConfig {
    /// Load a JSON configuration and validate it.
    pub fn from_json_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let content = fs::read_to_string(file_path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameters that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        for (name, frame) in &[
            ("depth", self.depth_frame),
            ("IR", self.ir_frame),
            ("RGB", self.rgb_frame),
        ] {
            if frame.width == 0 || frame.height == 0 {
                return Err(Error::Config(format!(
                    "{} frame has zero size ({}x{})",
                    name, frame.width, frame.height
                )));
            }
        }
        let params = &self.interpolation;
        if params.window_size % 2 == 0 {
            return Err(Error::Config(format!(
                "interpolation window size must be odd, got {}",
                params.window_size
            )));
        }
        if !(params.spatial_sigma > 0.0 && params.depth_sigma > 0.0) {
            return Err(Error::Config(format!(
                "interpolation sigmas must be positive, got {} and {}",
                params.spatial_sigma, params.depth_sigma
            )));
        }
        if let Some(filter) = &self.outlier_filter {
            let (lo, hi) = (filter.lower_percentile, filter.upper_percentile);
            if !(0.0 <= lo && lo <= hi && hi <= 100.0) {
                return Err(Error::Config(format!(
                    "outlier percentiles must satisfy 0 <= {} <= {} <= 100",
                    lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Grid of the samples, with outliers rejected.
    pub fn build_depth_grid(
        &self,
        samples: &[PointSample],
    ) -> Result<(DepthMap, Option<(Float, Float)>)> {
        let frame = self.depth_frame;
        let grid =
            depth_grid::from_samples(samples, frame.height, frame.width, self.require_full_cloud)?;
        Ok(match &self.outlier_filter {
            Some(filter) => depth_grid::reject_outliers(grid, filter),
            None => (grid, None),
        })
    }

    /// Project every dense depth cell into both sensors.
    pub fn map_cells(&self, dense_depth: &DepthMap) -> Mapping {
        let ir = SensorModel {
            frame: self.ir_frame,
            coefficients: &self.ir_coefficients,
        };
        let rgb = SensorModel {
            frame: self.rgb_frame,
            coefficients: &self.rgb_coefficients,
        };
        projection::map_cells(dense_depth, &ir, &rgb)
    }

    /// Run all the stages on in-memory inputs.
    pub fn run(
        &self,
        samples: &[PointSample],
        ir: &DMatrix<u8>,
        rgb: &RgbMat,
    ) -> std::result::Result<Output, RunError> {
        self.validate().at_stage(Stage::Configuration)?;
        check_frame(ir.shape(), self.ir_frame, "IR")
            .and_then(|_| check_frame(rgb.shape(), self.rgb_frame, "RGB"))
            .at_stage(Stage::LoadImages)?;

        let (raw_depth, outlier_bounds) =
            self.build_depth_grid(samples).at_stage(Stage::BuildDepthGrid)?;
        let dense_depth = interpolation::fill(&raw_depth, &self.interpolation);
        log::info!("Interpolated depth grid {:?}", dense_depth.shape());

        let mapping = self.map_cells(&dense_depth);
        let ir_in_rgb = projection::warp(
            &mapping.cells,
            ir,
            Sensor::Ir,
            Sensor::Rgb,
            self.rgb_frame,
            projection::above_threshold(ir, self.ir_threshold),
        );
        let rgb_in_ir = projection::warp(
            &mapping.cells,
            rgb,
            Sensor::Rgb,
            Sensor::Ir,
            self.ir_frame,
            |_, _| true,
        );
        log::info!(
            "Warped {} IR pixels into RGB and {} RGB pixels into IR",
            ir_in_rgb.nb_valid(),
            rgb_in_ir.nb_valid()
        );

        let aligned_ir = gap_fill::fill_nearest_or_default(&ir_in_rgb);
        let aligned_rgb = gap_fill::fill_nearest_or_default(&rgb_in_ir);
        Ok(Output {
            raw_depth,
            outlier_bounds,
            dense_depth,
            mapping,
            ir_in_rgb,
            aligned_ir,
            rgb_in_ir,
            aligned_rgb,
        })
    }

    /// Read the inputs from files and run all the stages.
    pub fn run_files<P: AsRef<Path>>(
        &self,
        cloud_path: P,
        ir_path: P,
        rgb_path: P,
    ) -> std::result::Result<Output, RunError> {
        self.validate().at_stage(Stage::Configuration)?;
        let max_records = self.depth_frame.width * self.depth_frame.height;
        let (_, samples) =
            point_cloud::read_file(cloud_path, self.depth_frame.width, Some(max_records))
                .at_stage(Stage::ReadPointCloud)?;
        log::info!("Read {} point samples", samples.len());
        let ir = interop::read_gray(ir_path).at_stage(Stage::LoadImages)?;
        let rgb = interop::read_rgb(rgb_path).at_stage(Stage::LoadImages)?;
        self.run(&samples, &ir, &rgb)
    }
}

fn check_frame(shape: (usize, usize), frame: SensorFrame, name: &str) -> Result<()> {
    if shape == (frame.height, frame.width) {
        Ok(())
    } else {
        Err(Error::Dimension {
            expected: format!("{} image of {}x{}", name, frame.width, frame.height),
            found: format!("{}x{}", shape.1, shape.0),
        })
    }
}

/// Write tables and aligned images into `out_dir`.
/// With `composite`, also write an IR heat map overlay on the given RGB image
/// and a false color depth image.
pub fn write_outputs<P: AsRef<Path>>(
    output: &Output,
    out_dir: P,
    composite: Option<(&RgbMat, u8)>,
) -> Result<()> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;
    let create = |name: &str| -> Result<BufWriter<File>> {
        Ok(BufWriter::new(File::create(out_dir.join(name))?))
    };

    let mut writer = create(file_names::RAW_DEPTH)?;
    blaze::write_depth_table(&mut writer, &output.raw_depth)?;
    writer.flush()?;
    let mut writer = create(file_names::DENSE_DEPTH)?;
    blaze::write_depth_table(&mut writer, &output.dense_depth)?;
    writer.flush()?;
    let mut writer = create(file_names::MAPPING)?;
    blaze::write_mapping_table(&mut writer, &output.mapping.cells)?;
    writer.flush()?;

    interop::image_from_matrix(&output.aligned_ir).save(out_dir.join(file_names::IR_IN_RGB))?;
    interop::rgb_from_matrix(&output.aligned_rgb).save(out_dir.join(file_names::RGB_IN_IR))?;

    if let Some((rgb, threshold)) = composite {
        view::ir_overlay(&output.ir_in_rgb, rgb, threshold)?
            .save(out_dir.join(file_names::OVERLAY))?;
        view::depth_image(&output.dense_depth).save(out_dir.join(file_names::DEPTH_COLORS))?;
    }
    log::info!("Outputs written in {}", out_dir.display());
    Ok(())
}

// TESTS #############################################################
