// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types shared by all the alignment stages.

use std::fmt;

/// Errors returned by the alignment stages.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or truncated point cloud.
    #[error("malformed point cloud at byte {offset} (record {record:?}): {reason}")]
    Format {
        offset: u64,
        record: Option<usize>,
        reason: String,
    },
    /// Grid dimensions do not agree with the point cloud.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    Dimension { expected: String, found: String },
    /// The depth-specific homography of a cell cannot be inverted.
    #[error("degenerate projection at depth cell (row {row}, col {col})")]
    DegenerateProjection { row: usize, col: usize },
    /// Gap filling was asked to propagate from an empty mask.
    #[error("no valid pixel to propagate from")]
    EmptyMask,
    /// Line oriented text file that could not be parsed.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type of the alignment stages.
pub type Result<T> = std::result::Result<T, Error>;

/// Fallible stages of the alignment pipeline, used to report where a run failed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Stage {
    Configuration,
    ReadPointCloud,
    BuildDepthGrid,
    LoadImages,
    WriteOutputs,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::ReadPointCloud => "point cloud reading",
            Stage::BuildDepthGrid => "depth grid building",
            Stage::LoadImages => "sensor image loading",
            Stage::WriteOutputs => "output writing",
        };
        f.write_str(name)
    }
}

/// Error of a full pipeline run, tagged with the failing stage.
#[derive(thiserror::Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// Attach a stage to the error of a stage result.
pub trait AtStage<T> {
    fn at_stage(self, stage: Stage) -> std::result::Result<T, RunError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at_stage(self, stage: Stage) -> std::result::Result<T, RunError> {
        self.map_err(|source| RunError { stage, source })
    }
}
