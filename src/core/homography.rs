// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Depth-parameterized homographies.
//!
//! Each entry of the 3x3 matrix is an affine function of the depth `d` (in cm):
//! `H_ij(d) = a_ij + b_ij * d`.
//! The bottom right entry is the projective scale and stays constant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;

use crate::core::error::Error;
use crate::misc::type_aliases::{Float, Mat3};

/// Affine function of the depth for one matrix entry.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Linear {
    /// Value at depth 0.
    pub offset: Float,
    /// Change per cm.
    pub slope: Float,
}

impl Linear {
    pub fn new(offset: Float, slope: Float) -> Self {
        Linear { offset, slope }
    }

    pub fn eval(&self, d: Float) -> Float {
        self.offset + self.slope * d
    }
}

/// Coefficients of a depth-parameterized homography.
///
/// Serialized as a map from entry labels (`"H11"` to `"H33"`)
/// to `[offset, slope]` pairs.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, (Float, Float)>",
    try_from = "BTreeMap<String, (Float, Float)>"
)]
pub struct Coefficients {
    /// Entries indexed by `[row][col]`, 0-based.
    pub entries: [[Linear; 3]; 3],
}

/// Label of the 0-based matrix entry `(i, j)`, i.e. `H{i+1}{j+1}`.
pub fn label(i: usize, j: usize) -> String {
    format!("H{}{}", i + 1, j + 1)
}

/// Depth in cm of a raw depth value `z` in mm.
/// The sensor reports negative values in front of it.
/// Background (`z == 0`) maps to depth 0.
pub fn depth_cm(z: Float) -> Float {
    if z != 0.0 {
        -z / 10.0
    } else {
        0.0
    }
}

impl Coefficients {
    /// Build from `[offset, slope]` pairs in row-major order.
    pub fn from_pairs(pairs: [[(Float, Float); 3]; 3]) -> Self {
        let mut entries = [[Linear::default(); 3]; 3];
        for (i, row) in pairs.iter().enumerate() {
            for (j, &(a, b)) in row.iter().enumerate() {
                entries[i][j] = Linear::new(a, b);
            }
        }
        Coefficients { entries }
    }

    /// Homography at depth `d` (cm).
    pub fn at_depth(&self, d: Float) -> Mat3 {
        Mat3::from_fn(|i, j| {
            let entry = &self.entries[i][j];
            if (i, j) == (2, 2) {
                entry.offset
            } else {
                entry.eval(d)
            }
        })
    }

    /// Inverse of the homography at depth `d`, `None` if singular.
    pub fn inverse_at_depth(&self, d: Float) -> Option<Mat3> {
        self.at_depth(d).try_inverse()
    }
}

impl From<Coefficients> for BTreeMap<String, (Float, Float)> {
    fn from(coefs: Coefficients) -> Self {
        let mut map = BTreeMap::new();
        for i in 0..3 {
            for j in 0..3 {
                let e = coefs.entries[i][j];
                map.insert(label(i, j), (e.offset, e.slope));
            }
        }
        map
    }
}

impl TryFrom<BTreeMap<String, (Float, Float)>> for Coefficients {
    type Error = Error;

    fn try_from(mut map: BTreeMap<String, (Float, Float)>) -> Result<Self, Self::Error> {
        let mut entries = [[Linear::default(); 3]; 3];
        for (i, row) in entries.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                let key = label(i, j);
                let (a, b) = map
                    .remove(&key)
                    .ok_or_else(|| Error::Config(format!("missing coefficient {}", key)))?;
                *entry = Linear::new(a, b);
            }
        }
        if let Some(key) = map.keys().next() {
            return Err(Error::Config(format!("unknown coefficient {}", key)));
        }
        Ok(Coefficients { entries })
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dataset::blaze;
    use approx::assert_relative_eq;
    use quickcheck_macros;

    fn sloped() -> Coefficients {
        let mut coefs = blaze::ir_coefficients();
        coefs.entries[2][2].slope = 0.5;
        coefs
    }

    #[test]
    fn depth_conversion() {
        assert_eq!(depth_cm(-1500.0), 150.0);
        assert_eq!(depth_cm(0.0), 0.0);
        assert_eq!(depth_cm(20.0), -2.0);
    }

    #[test]
    fn labels() {
        assert_eq!(label(0, 0), "H11");
        assert_eq!(label(1, 2), "H23");
        assert_eq!(label(2, 2), "H33");
    }

    #[test]
    fn intercepts_at_zero_depth() {
        let coefs = sloped();
        let h = coefs.at_depth(0.0);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(h[(i, j)], coefs.entries[i][j].offset);
            }
        }
    }

    #[test]
    fn affine_in_depth() {
        let coefs = blaze::rgb_coefficients();
        let h = coefs.at_depth(150.0);
        assert_relative_eq!(h[(0, 2)], 172.811 + 0.025 * 150.0);
        assert_relative_eq!(h[(2, 0)], -0.00016 + 0.0000009 * 150.0);
    }

    #[test]
    fn calibrated_homographies_are_invertible() {
        for coefs in &[blaze::ir_coefficients(), blaze::rgb_coefficients()] {
            for d in &[0.0, 50.0, 100.0, 250.0] {
                let inv = coefs.inverse_at_depth(*d).unwrap();
                assert_relative_eq!(inv * coefs.at_depth(*d), Mat3::identity(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let coefs = Coefficients::default();
        assert!(coefs.inverse_at_depth(10.0).is_none());
    }

    #[test]
    fn json_uses_labels() {
        let json = serde_json::to_string(&blaze::ir_coefficients()).unwrap();
        assert!(json.starts_with("{\"H11\":[1.07204,"));
        assert!(json.contains("\"H33\":[1.0,0.0]"));
        let back: Coefficients = serde_json::from_str(&json).unwrap();
        assert_eq!(back, blaze::ir_coefficients());
    }

    #[test]
    fn json_requires_all_entries() {
        let res: Result<Coefficients, _> = serde_json::from_str("{\"H11\":[1.0,0.0]}");
        assert!(res.is_err());
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn scale_entry_is_constant(d: i32) -> bool {
        let coefs = sloped();
        coefs.at_depth(Float::from(d))[(2, 2)] == coefs.entries[2][2].offset
    }
}
