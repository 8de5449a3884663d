use image::{imageops::FilterType, DynamicImage, GrayImage, ImageBuffer, Luma};
use ndarray::{s, Array2, ArrayView2};
use tracing::instrument;

use crate::result::{BinaryArray, BoundingBox, GrayArray};

const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Luminance of every pixel, alpha dropped.
#[instrument(level = "debug", skip(image))]
pub(crate) fn luminance(image: &DynamicImage) -> GrayArray {
    let image = image.to_rgb32f();
    Array2::<f32>::from_shape_fn(
        (image.height() as usize, image.width() as usize),
        |(y, x)| {
            let pixel = image.get_pixel(x as u32, y as u32).0;
            pixel
                .iter()
                .zip(LUMA_WEIGHTS)
                .map(|(channel, weight)| channel * weight)
                .sum::<f32>()
                .clamp(0.0, 1.0)
        },
    )
}

/// Bilinear resize of a grayscale array to `(rows, cols)`.
pub fn resize_gray(data: ArrayView2<f32>, (rows, cols): (usize, usize)) -> GrayArray {
    let (height, width) = data.dim();
    if height == 0 || width == 0 || rows == 0 || cols == 0 {
        return Array2::zeros((rows, cols));
    }
    if (height, width) == (rows, cols) {
        return data.to_owned();
    }
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([data[[y as usize, x as usize]]])
        });
    let resized = image::imageops::resize(&buffer, cols as u32, rows as u32, FilterType::Triangle);
    log::trace!("Resized {width}x{height} to {cols}x{rows}");
    Array2::from_shape_fn((rows, cols), |(y, x)| {
        resized.get_pixel(x as u32, y as u32).0[0]
    })
}

pub(crate) fn crop<T: Clone>(data: ArrayView2<T>, bounds: &BoundingBox) -> Array2<T> {
    data.slice(s![
        bounds.min_row..bounds.max_row,
        bounds.min_col..bounds.max_col
    ])
    .to_owned()
}

pub(crate) fn to_mask_image(data: ArrayView2<bool>) -> GrayImage {
    let (height, width) = data.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if data[[y as usize, x as usize]] {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

pub(crate) fn to_intensity(data: ArrayView2<bool>) -> GrayArray {
    data.mapv(|it| if it { 1.0 } else { 0.0 })
}

pub(crate) fn foreground_count(data: &BinaryArray) -> usize {
    data.iter().filter(|it| **it).count()
}
