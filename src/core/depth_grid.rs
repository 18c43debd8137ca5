// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Assemble a depth grid from point samples and reject statistical outliers.
//!
//! A grid cell is in one of three states:
//!   * missing (NaN): no sample, or rejected. Those are filled by interpolation.
//!   * background (exactly 0): the sensor reported no depth. Never modified.
//!   * known: any other finite value.

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::point_cloud::PointSample;
use crate::math::stats;
use crate::misc::type_aliases::{DepthMap, Float};

/// Percentile band outside of which depth values are considered outliers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutlierFilter {
    /// Lower percentile, in `[0, 100]`.
    pub lower_percentile: Float,
    /// Upper percentile, in `[0, 100]`.
    pub upper_percentile: Float,
    /// Below this number of known values, the band is not computed
    /// and nothing is rejected.
    pub min_samples: usize,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        OutlierFilter {
            lower_percentile: 1.0,
            upper_percentile: 99.0,
            min_samples: 100,
        }
    }
}

/// Write every sample at `(row - 1, col - 1)` of a `nrows x ncols` grid.
///
/// Cells without sample stay missing, as well as non-finite samples.
/// With `require_full`, the number of samples must be exactly `nrows * ncols`.
pub fn from_samples(
    samples: &[PointSample],
    nrows: usize,
    ncols: usize,
    require_full: bool,
) -> Result<DepthMap> {
    if require_full && samples.len() != nrows * ncols {
        return Err(Error::Dimension {
            expected: format!("{} samples ({}x{})", nrows * ncols, ncols, nrows),
            found: format!("{} samples", samples.len()),
        });
    }
    let mut grid = DepthMap::from_element(nrows, ncols, Float::NAN);
    for s in samples {
        if s.row == 0 || s.col == 0 || s.row > nrows || s.col > ncols {
            return Err(Error::Dimension {
                expected: format!("row in 1..={} and col in 1..={}", nrows, ncols),
                found: format!("row {} col {}", s.row, s.col),
            });
        }
        if s.z.is_finite() {
            grid[(s.row - 1, s.col - 1)] = Float::from(s.z);
        }
    }
    Ok(grid)
}

/// True for cells holding a usable depth: neither missing nor background.
pub fn is_known(z: Float) -> bool {
    z.is_finite() && z != 0.0
}

/// Percentile band of the known values of the grid.
/// `None` if there are fewer than `filter.min_samples` known values.
pub fn outlier_bounds(grid: &DepthMap, filter: &OutlierFilter) -> Option<(Float, Float)> {
    let known: Vec<Float> = grid.iter().cloned().filter(|&z| is_known(z)).collect();
    if known.len() < filter.min_samples.max(1) {
        log::debug!(
            "Outlier filter skipped: {} known values < {}",
            known.len(),
            filter.min_samples
        );
        return None;
    }
    let p = stats::percentiles(&known, &[filter.lower_percentile, filter.upper_percentile])?;
    Some((p[0], p[1]))
}

/// Reset to missing every known value outside the percentile band.
///
/// Returns the filtered grid and the band that was used, if any.
pub fn reject_outliers(
    mut grid: DepthMap,
    filter: &OutlierFilter,
) -> (DepthMap, Option<(Float, Float)>) {
    let bounds = outlier_bounds(&grid, filter);
    if let Some((z_min, z_max)) = bounds {
        let mut nb_rejected = 0_usize;
        grid.iter_mut()
            .filter(|z| is_known(**z) && (**z < z_min || **z > z_max))
            .for_each(|z| {
                *z = Float::NAN;
                nb_rejected += 1;
            });
        log::info!(
            "Rejected {} depth outliers outside [{:.3}, {:.3}]",
            nb_rejected,
            z_min,
            z_max
        );
    }
    (grid, bounds)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use quickcheck_macros;

    fn samples_of(values: &[f32], width: usize) -> Vec<PointSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &z)| PointSample::from_index(i, width, z))
            .collect()
    }

    #[test]
    fn unvisited_cells_are_missing() {
        let grid = from_samples(&samples_of(&[1.0, 2.0, 3.0], 2), 2, 2, false).unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid[(0, 0)], 1.0);
        assert_eq!(grid[(0, 1)], 2.0);
        assert_eq!(grid[(1, 0)], 3.0);
        assert!(grid[(1, 1)].is_nan());
    }

    #[test]
    fn full_cloud_equals_direct_indexing() {
        let (w, h) = (4, 3);
        let values: Vec<f32> = (0..w * h).map(|i| -(i as f32) * 1.5).collect();
        let samples = samples_of(&values, w);
        let grid = from_samples(&samples, h, w, true).unwrap();
        let mut direct = DepthMap::from_element(h, w, Float::NAN);
        for s in &samples {
            direct[(s.row - 1, s.col - 1)] = Float::from(s.z);
        }
        assert_eq!(grid, direct);
    }

    #[test]
    fn strict_mode_checks_count() {
        let res = from_samples(&samples_of(&[1.0; 5], 2), 3, 2, true);
        assert!(matches!(res, Err(Error::Dimension { .. })));
    }

    #[test]
    fn sample_outside_grid() {
        let samples = [PointSample { row: 3, col: 1, z: 1.0 }];
        let res = from_samples(&samples, 2, 2, false);
        assert!(matches!(res, Err(Error::Dimension { .. })));
    }

    #[test]
    fn non_finite_samples_are_missing() {
        let grid = from_samples(&samples_of(&[f32::INFINITY, f32::NAN], 2), 1, 2, false).unwrap();
        assert!(grid.iter().all(|z| z.is_nan()));
    }

    #[test]
    fn too_few_samples_disable_filter() {
        let mut grid = DepthMap::from_element(2, 2, Float::NAN);
        grid[(0, 0)] = 100.0;
        grid[(0, 1)] = 0.0;
        grid[(1, 1)] = 105.0;
        let (filtered, bounds) = reject_outliers(grid.clone(), &OutlierFilter::default());
        assert_eq!(bounds, None);
        assert_eq!(filtered[(0, 0)], 100.0);
        assert_eq!(filtered[(1, 1)], 105.0);
    }

    #[test]
    fn extremes_are_rejected() {
        // 200 values: -1000 .. -801, plus zeros that must survive.
        let mut grid = DepthMap::from_fn(20, 11, |r, c| -1000.0 + (r * 10 + c) as Float);
        for r in 0..20 {
            grid[(r, 10)] = 0.0;
        }
        let (filtered, bounds) = reject_outliers(grid, &OutlierFilter::default());
        let (z_min, z_max) = bounds.unwrap();
        assert!(filtered[(0, 0)].is_nan());
        assert!(filtered[(19, 9)].is_nan());
        assert_eq!(filtered[(10, 5)], -1000.0 + 105.0);
        assert!(z_min > -1000.0 && z_max < -801.0);
        assert!((0..20).all(|r| filtered[(r, 10)] == 0.0));
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn filter_respects_band_and_zeros(values: Vec<i16>) -> bool {
        let ncols = 8;
        let nrows = values.len() / ncols;
        if nrows == 0 {
            return true;
        }
        let grid = DepthMap::from_fn(nrows, ncols, |r, c| Float::from(values[r * ncols + c]));
        let filter = OutlierFilter {
            min_samples: 4,
            ..OutlierFilter::default()
        };
        let (filtered, bounds) = reject_outliers(grid.clone(), &filter);
        grid.iter().zip(filtered.iter()).all(|(&z, &f)| {
            if z == 0.0 {
                f == 0.0
            } else {
                match bounds {
                    Some((lo, hi)) if z < lo || z > hi => f.is_nan(),
                    _ => f == z,
                }
            }
        })
    }
}
