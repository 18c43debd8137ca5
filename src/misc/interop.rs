// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interoperability conversions between the image and matrix types.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use nalgebra::DMatrix;
use std::path::Path;

use crate::core::error::Result;
use crate::misc::type_aliases::{Rgb8, RgbMat};

/// Convert an `u8` matrix into a `GrayImage`.
/// Inverse operation of `matrix_from_image`.
///
/// Performs a transposition to accomodate for the
/// column major matrix into the row major image.
#[allow(clippy::cast_possible_truncation)]
pub fn image_from_matrix(mat: &DMatrix<u8>) -> GrayImage {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = GrayImage::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        *pixel = Luma([mat[(y as usize, x as usize)]]);
    }
    img_buf
}

/// Convert an `(u8,u8,8)` matrix into an `RgbImage`.
/// Inverse operation of `rgb_matrix_from_image`.
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_from_matrix(mat: &RgbMat) -> RgbImage {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = RgbImage::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        let (r, g, b) = mat[(y as usize, x as usize)];
        *pixel = Rgb([r, g, b]);
    }
    img_buf
}

/// Convert a `GrayImage` into an `u8` matrix.
/// Inverse operation of `image_from_matrix`.
pub fn matrix_from_image(img: GrayImage) -> DMatrix<u8> {
    let (width, height) = img.dimensions();
    DMatrix::from_row_slice(height as usize, width as usize, &img.into_raw())
}

/// Convert an `RgbImage` into an `(u8,u8,u8)` matrix.
pub fn rgb_matrix_from_image(img: &RgbImage) -> RgbMat {
    let (width, height) = img.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |y, x| {
        let Rgb([r, g, b]) = *img.get_pixel(x as u32, y as u32);
        (r, g, b)
    })
}

/// Gray level of an RGB pixel, with the ITU-R BT.601 luma weights.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn luma((r, g, b): Rgb8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().min(255.0) as u8
}

/// Spread the range of 16 bits intensities onto 8 bits.
/// A constant image maps to zero.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn normalize_u16(mat: &DMatrix<u16>) -> DMatrix<u8> {
    let min = mat.iter().cloned().min().unwrap_or(0);
    let max = mat.iter().cloned().max().unwrap_or(0);
    if max == min {
        return mat.map(|_| 0);
    }
    let range = f32::from(max - min);
    mat.map(|v| (f32::from(v - min) / range * 255.0) as u8)
}

/// Intensity image of a sensor.
/// 16 bits captures are min-max normalized, color ones are converted to gray.
#[allow(clippy::cast_possible_truncation)]
pub fn gray_from_dynamic(img: DynamicImage) -> DMatrix<u8> {
    match img {
        DynamicImage::ImageLuma8(gray) => matrix_from_image(gray),
        DynamicImage::ImageLuma16(gray) => {
            let (width, height) = gray.dimensions();
            let raw = DMatrix::from_row_slice(height as usize, width as usize, &gray.into_raw());
            normalize_u16(&raw)
        }
        other => rgb_matrix_from_image(&other.to_rgb8()).map(luma),
    }
}

/// Load an image file as an intensity matrix.
pub fn read_gray<P: AsRef<Path>>(file_path: P) -> Result<DMatrix<u8>> {
    Ok(gray_from_dynamic(image::open(file_path)?))
}

/// Load an image file as an RGB matrix.
pub fn read_rgb<P: AsRef<Path>>(file_path: P) -> Result<RgbMat> {
    Ok(rgb_matrix_from_image(&image::open(file_path)?.to_rgb8()))
}

// TESTS #############################################################
