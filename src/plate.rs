use ndarray::{ArrayView2, Axis};
use tracing::instrument;

use crate::{
    error::{RecognitionError, Result},
    normalize::otsu_threshold,
    result::{BinaryArray, PlateImage, RegionCandidate},
};

pub const DEFAULT_INVERTED_THRESHOLD_OFFSET: f32 = 0.05;

/// Marks pixels darker than a lowered Otsu level, so dark characters on a light plate become
/// foreground.
pub fn inverted_threshold(gray: ArrayView2<f32>, offset: f32) -> BinaryArray {
    let level = otsu_threshold(gray) - offset;
    gray.mapv(|it| it < level)
}

/// Average number of foreground pixels per column.
pub fn column_density(binary: ArrayView2<bool>) -> f32 {
    let width = binary.len_of(Axis(1));
    if width == 0 {
        return 0.0;
    }
    let total = binary
        .axis_iter(Axis(1))
        .map(|column| column.iter().filter(|it| **it).count())
        .sum::<usize>();
    total as f32 / width as f32
}

/// Picks the candidate most likely to be the plate.
///
/// A single candidate is binarized directly. With several, the one with the highest
/// [`column_density`] wins; scores are compared with `>=`, so on an exact tie the later candidate
/// replaces the earlier one.
#[instrument(level = "debug", skip(candidates), fields(count = candidates.len()))]
pub fn select_plate(candidates: &[RegionCandidate], offset: f32) -> Result<PlateImage> {
    let (first, rest) = candidates
        .split_first()
        .ok_or(RecognitionError::NoPlateFound)?;

    let mut best = PlateImage {
        bounds: first.bounds,
        binary: inverted_threshold(first.image.view(), offset),
    };
    if rest.is_empty() {
        return Ok(best);
    }

    let mut highest = column_density(best.view());
    log::trace!("Candidate {:?} density {highest}", first.bounds);
    for candidate in rest {
        let binary = inverted_threshold(candidate.image.view(), offset);
        let density = column_density(binary.view());
        log::trace!("Candidate {:?} density {density}", candidate.bounds);
        if density >= highest {
            highest = density;
            best = PlateImage {
                bounds: candidate.bounds,
                binary,
            };
        }
    }
    log::debug!("Selected plate at {:?} with density {highest}", best.bounds);
    Ok(best)
}
