use std::path::Path;

use image::DynamicImage;
use ndarray::ArrayView2;
use tracing::instrument;

use crate::{
    error::{RecognitionError, Result},
    result::{BinaryArray, GrayArray},
    util::{luminance, resize_gray},
};

pub const DEFAULT_MAX_WIDTH: usize = 600;

const OTSU_BINS: usize = 256;

/// Opens an image and returns its normalized grayscale form together with the Otsu binarization.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_and_normalize(
    path: impl AsRef<Path>,
    max_width: usize,
) -> Result<(GrayArray, BinaryArray)> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| RecognitionError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(normalize(&image, max_width))
}

pub fn normalize(image: &DynamicImage, max_width: usize) -> (GrayArray, BinaryArray) {
    let gray = resize_if_necessary(to_grayscale(image), max_width);
    let binary = threshold(gray.view());
    (gray, binary)
}

pub fn to_grayscale(image: &DynamicImage) -> GrayArray {
    luminance(image)
}

/// Shrinks images wider than `max_width` to exactly that width, keeping the aspect ratio.
pub fn resize_if_necessary(gray: GrayArray, max_width: usize) -> GrayArray {
    let (height, width) = gray.dim();
    if width <= max_width || height == 0 {
        return gray;
    }
    let ratio = width as f64 / height as f64;
    let new_height = ((max_width as f64 / ratio).round() as usize).max(1);
    log::debug!("Resizing {width}x{height} image to {max_width}x{new_height}");
    resize_gray(gray.view(), (new_height, max_width))
}

/// Otsu's threshold over a 256 bin histogram spanning the image's own value range.
///
/// Returns the center of the bin that maximizes the between-class variance. A constant image has
/// no second class, so its value is returned unchanged.
pub fn otsu_threshold(gray: ArrayView2<f32>) -> f32 {
    let (min, max) = gray
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), value| {
            (min.min(*value), max.max(*value))
        });
    if gray.is_empty() {
        return 0.0;
    }
    if min == max {
        return min;
    }

    let range = (max - min) as f64;
    let bin_width = range / OTSU_BINS as f64;
    let mut histogram = [0f64; OTSU_BINS];
    for value in gray.iter() {
        let bin = (((*value - min) as f64 / range) * OTSU_BINS as f64) as usize;
        histogram[bin.min(OTSU_BINS - 1)] += 1.0;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min as f64 + (i as f64 + 0.5) * bin_width)
        .collect();

    // Class weights and means for "at or below bin i" and "at or above bin i".
    let mut weight_low = [0f64; OTSU_BINS];
    let mut mean_low = [0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        count += histogram[i];
        sum += histogram[i] * centers[i];
        weight_low[i] = count;
        mean_low[i] = if count > 0.0 { sum / count } else { 0.0 };
    }
    let mut weight_high = [0f64; OTSU_BINS];
    let mut mean_high = [0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        count += histogram[i];
        sum += histogram[i] * centers[i];
        weight_high[i] = count;
        mean_high[i] = if count > 0.0 { sum / count } else { 0.0 };
    }

    let mut best_index = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let variance =
            weight_low[i] * weight_high[i + 1] * (mean_low[i] - mean_high[i + 1]).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_index = i;
        }
    }
    centers[best_index] as f32
}

/// `gray > otsu(gray)`.
pub fn threshold(gray: ArrayView2<f32>) -> BinaryArray {
    let level = otsu_threshold(gray);
    log::trace!("Otsu level {level}");
    gray.mapv(|it| it > level)
}
