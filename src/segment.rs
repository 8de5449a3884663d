use tracing::instrument;

use crate::{
    classifier::CHARACTER_SHAPE,
    error::Result,
    region::{label_components, within},
    result::{PlateImage, Segmentation},
    util::{crop, resize_gray, to_intensity},
};

/// Splits a plate into character crops.
pub trait Segmenter: Send + Sync {
    fn segment(&self, plate: &PlateImage) -> Result<Segmentation>;
}

/// Treats every plate component of character size as one character.
///
/// Ranges are fractions of the plate height and width, inclusive. Crops are emitted in label
/// order together with their left column; ordering by column is left to text reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentSegmenter {
    pub height_range: (f64, f64),
    pub width_range: (f64, f64),
    pub output_shape: (usize, usize),
}

impl Default for ComponentSegmenter {
    fn default() -> Self {
        Self {
            height_range: (0.35, 0.60),
            width_range: (0.05, 0.15),
            output_shape: CHARACTER_SHAPE,
        }
    }
}

impl Segmenter for ComponentSegmenter {
    #[instrument(level = "debug", skip(self, plate))]
    fn segment(&self, plate: &PlateImage) -> Result<Segmentation> {
        let (plate_height, plate_width) = plate.binary.dim();

        let mut segmentation = Segmentation::default();
        for component in label_components(plate.view()) {
            if !within(component.bounds.height(), self.height_range, plate_height)
                || !within(component.bounds.width(), self.width_range, plate_width)
            {
                continue;
            }
            let character = to_intensity(crop(plate.view(), &component.bounds).view());
            segmentation
                .fullscale
                .push(resize_gray(character.view(), self.output_shape));
            segmentation.columns.push(component.bounds.min_col as u32);
        }
        log::debug!("{} character(s) segmented", segmentation.fullscale.len());
        Ok(segmentation)
    }
}
