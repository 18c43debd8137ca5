// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Color maps for false color visualizations.

use crate::misc::type_aliases::Rgb8;

/// Evenly spaced samples of the inferno color map, from black to light yellow.
const INFERNO_SAMPLES: [Rgb8; 10] = [
    (0x00, 0x00, 0x04),
    (0x1b, 0x0c, 0x41),
    (0x4a, 0x0c, 0x6b),
    (0x78, 0x1c, 0x6d),
    (0xa5, 0x2c, 0x60),
    (0xcf, 0x44, 0x46),
    (0xed, 0x69, 0x25),
    (0xfb, 0x9b, 0x06),
    (0xf7, 0xd1, 0x3d),
    (0xfc, 0xff, 0xa4),
];

/// Inferno color map with 256 entries,
/// linearly interpolated between reference samples.
pub fn inferno_u8() -> Vec<Rgb8> {
    (0..256).map(|i| sample(&INFERNO_SAMPLES, i as f32 / 255.0)).collect()
}

/// Color at position `t` in `[0, 1]` of a piecewise linear color map.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn sample(anchors: &[Rgb8], t: f32) -> Rgb8 {
    let last = anchors.len() - 1;
    let pos = t.max(0.0).min(1.0) * last as f32;
    let idx = (pos.floor() as usize).min(last - 1);
    let alpha = pos - idx as f32;
    let lerp = |a: u8, b: u8| ((1.0 - alpha) * f32::from(a) + alpha * f32::from(b)).round() as u8;
    let (a, b) = (anchors[idx], anchors[idx + 1]);
    (lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferno_end_points() {
        let inferno = inferno_u8();
        assert_eq!(inferno.len(), 256);
        assert_eq!(inferno[0], INFERNO_SAMPLES[0]);
        assert_eq!(inferno[255], INFERNO_SAMPLES[9]);
    }

    #[test]
    fn inferno_gets_brighter() {
        let inferno = inferno_u8();
        let brightness = |c: &Rgb8| u32::from(c.0) + u32::from(c.1) + u32::from(c.2);
        assert!(brightness(&inferno[0]) < brightness(&inferno[128]));
        assert!(brightness(&inferno[128]) < brightness(&inferno[255]));
    }
}
