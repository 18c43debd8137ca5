// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Order statistics.

use num_traits::Float;
use std::cmp::Ordering;

/// Percentiles of a set of values, linearly interpolated between order statistics.
///
/// Each percentile must be in `[0, 100]`.
/// Returns `None` if `values` is empty or contains NaN.
pub fn percentiles<T: Float>(values: &[T], pcts: &[T]) -> Option<Vec<T>> {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let hundred = T::from(100.0)?;
    let last = T::from(sorted.len() - 1)?;
    pcts.iter()
        .map(|&p| {
            let rank = p / hundred * last;
            let low = rank.floor();
            let frac = rank - low;
            let i = low.to_usize()?;
            let a = *sorted.get(i)?;
            Some(match sorted.get(i + 1) {
                Some(&b) if frac > T::zero() => a + (b - a) * frac,
                _ => a,
            })
        })
        .collect()
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;
    use quickcheck_macros;

    #[test]
    fn interpolates_between_order_statistics() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        let p = percentiles(&values, &[0.0, 25.0, 50.0, 90.0, 100.0]).unwrap();
        assert_relative_eq!(p[0], 1.0);
        assert_relative_eq!(p[1], 2.0);
        assert_relative_eq!(p[2], 3.0);
        assert_relative_eq!(p[3], 4.6, epsilon = 1e-12);
        assert_relative_eq!(p[4], 5.0);
    }

    #[test]
    fn two_values() {
        let p = percentiles(&[100.0_f64, 105.0], &[1.0, 99.0]).unwrap();
        assert_relative_eq!(p[0], 100.05, epsilon = 1e-9);
        assert_relative_eq!(p[1], 104.95, epsilon = 1e-9);
    }

    #[test]
    fn empty_or_nan() {
        assert_eq!(percentiles::<f64>(&[], &[50.0]), None);
        assert_eq!(percentiles(&[1.0, f64::NAN], &[50.0]), None);
    }

    #[quickcheck_macros::quickcheck]
    fn within_min_max(values: Vec<i16>, pct: u8) -> bool {
        if values.is_empty() {
            return true;
        }
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        let pct = f64::from(pct % 101);
        let p = percentiles(&values, &[pct]).unwrap()[0];
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        min <= p && p <= max
    }
}
