// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Exact Euclidean distance transform returning nearest cell indices.
//!
//! Separable algorithm of Felzenszwalb and Huttenlocher,
//! "Distance Transforms of Sampled Functions" (2012):
//! a 1D pass along columns finds the nearest source row in each column,
//! then a lower envelope of parabolas along each row picks the best column.

use nalgebra::DMatrix;

use crate::misc::type_aliases::Mask;

/// For every cell, the `(row, col)` of the nearest cell where `mask` is true,
/// by Euclidean distance. Cells of the mask map to themselves.
///
/// Returns `None` if the mask has no true cell.
/// Ties are resolved deterministically but in no particular direction.
pub fn nearest_indices(mask: &Mask) -> Option<DMatrix<(usize, usize)>> {
    if !mask.iter().any(|&m| m) {
        return None;
    }
    let (nrows, ncols) = mask.shape();
    let nearest_row = nearest_in_columns(mask);

    let mut nearest = DMatrix::from_element(nrows, ncols, (0, 0));
    let mut envelope = Envelope::with_capacity(ncols);
    for r in 0..nrows {
        envelope.build((0..ncols).map(|c| nearest_row[(r, c)].map(|row| square_dist(row, r))));
        let mut k = 0;
        for x in 0..ncols {
            while envelope.bounds[k + 1] < x as f64 {
                k += 1;
            }
            let (col, _) = envelope.sites[k];
            // Envelope sites only come from columns with a source.
            if let Some(row) = nearest_row[(r, col)] {
                nearest[(r, x)] = (row, col);
            }
        }
    }
    Some(nearest)
}

/// Nearest true row of each cell within its own column.
fn nearest_in_columns(mask: &Mask) -> DMatrix<Option<usize>> {
    let (nrows, ncols) = mask.shape();
    let mut nearest_row = DMatrix::from_element(nrows, ncols, None);
    for c in 0..ncols {
        let mut above = None;
        for r in 0..nrows {
            if mask[(r, c)] {
                above = Some(r);
            }
            nearest_row[(r, c)] = above;
        }
        let mut below = None;
        for r in (0..nrows).rev() {
            if mask[(r, c)] {
                below = Some(r);
            }
            nearest_row[(r, c)] = match (nearest_row[(r, c)], below) {
                (Some(a), Some(b)) if b - r < r - a => Some(b),
                (Some(a), _) => Some(a),
                (None, b) => b,
            };
        }
    }
    nearest_row
}

fn square_dist(a: usize, b: usize) -> f64 {
    let d = a as f64 - b as f64;
    d * d
}

/// Lower envelope of the parabolas `(x - q)^2 + f(q)`.
struct Envelope {
    /// `(q, f(q))` of the parabolas in the envelope, left to right.
    sites: Vec<(usize, f64)>,
    /// `bounds[k]..bounds[k+1]` is the range where site `k` is the minimum.
    bounds: Vec<f64>,
}

impl Envelope {
    fn with_capacity(n: usize) -> Self {
        Envelope {
            sites: Vec::with_capacity(n),
            bounds: Vec::with_capacity(n + 1),
        }
    }

    /// Rebuild the envelope from the costs of each position, `None` for no parabola.
    fn build<I: Iterator<Item = Option<f64>>>(&mut self, costs: I) {
        self.sites.clear();
        self.bounds.clear();
        for (q, cost) in costs.enumerate() {
            let fq = match cost {
                Some(f) => f,
                None => continue,
            };
            let qf = q as f64;
            let mut left = f64::NEG_INFINITY;
            while let Some(&(v, fv)) = self.sites.last() {
                let vf = v as f64;
                let s = ((fq + qf * qf) - (fv + vf * vf)) / (2.0 * (qf - vf));
                if s <= self.bounds[self.bounds.len() - 1] {
                    self.sites.pop();
                    self.bounds.pop();
                } else {
                    left = s;
                    break;
                }
            }
            self.sites.push((q, fq));
            self.bounds.push(left);
        }
        self.bounds.push(f64::INFINITY);
    }
}

// TESTS #############################################################
