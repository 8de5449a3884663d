//! Plate candidate extraction.
//!
//! Foreground components are labeled with 8-connectivity: diagonal neighbours belong to the same
//! component. Changing this changes which pixels merge into one region and therefore which
//! candidates survive the geometry filter.

use std::collections::BTreeMap;

use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::ArrayView2;
use tracing::instrument;

use crate::{
    result::{BoundingBox, RegionCandidate},
    util::{crop, to_mask_image},
};

/// A labeled foreground component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub label: u32,
    pub bounds: BoundingBox,
    pub area: usize,
}

/// Labels all foreground components, returned in ascending label (discovery) order.
#[instrument(level = "trace", skip(binary))]
pub fn label_components(binary: ArrayView2<bool>) -> Vec<Component> {
    if binary.is_empty() {
        return Vec::new();
    }
    let mask = to_mask_image(binary);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut components = BTreeMap::<u32, Component>::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let (row, col) = (y as usize, x as usize);
        components
            .entry(label)
            .and_modify(|it| {
                it.bounds.min_row = it.bounds.min_row.min(row);
                it.bounds.min_col = it.bounds.min_col.min(col);
                it.bounds.max_row = it.bounds.max_row.max(row + 1);
                it.bounds.max_col = it.bounds.max_col.max(col + 1);
                it.area += 1;
            })
            .or_insert(Component {
                label,
                bounds: BoundingBox {
                    min_row: row,
                    min_col: col,
                    max_row: row + 1,
                    max_col: col + 1,
                },
                area: 1,
            });
    }
    components.into_values().collect()
}

/// Geometric bounds a component must satisfy to count as plate-shaped. Ranges are fractions of
/// the image height and width, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
    pub min_area: usize,
    pub height_range: (f64, f64),
    pub width_range: (f64, f64),
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self {
            min_area: 10,
            height_range: (0.08, 0.20),
            width_range: (0.15, 0.40),
        }
    }
}

impl RegionFilter {
    pub fn accepts(&self, bounds: &BoundingBox, shape: (usize, usize)) -> bool {
        let (image_height, image_width) = shape;
        within(bounds.height(), self.height_range, image_height)
            && within(bounds.width(), self.width_range, image_width)
            && bounds.width() > bounds.height()
    }

    #[instrument(level = "debug", skip(self, gray, binary))]
    pub fn extract(
        &self,
        gray: ArrayView2<f32>,
        binary: ArrayView2<bool>,
    ) -> Vec<RegionCandidate> {
        debug_assert_eq!(gray.dim(), binary.dim());
        let shape = binary.dim();
        let candidates = label_components(binary)
            .into_iter()
            .filter(|it| it.area >= self.min_area)
            .filter(|it| self.accepts(&it.bounds, shape))
            .map(|it| RegionCandidate {
                bounds: it.bounds,
                image: crop(gray, &it.bounds),
            })
            .collect::<Vec<_>>();
        log::debug!("{} plate-like region(s) found", candidates.len());
        candidates
    }
}

/// Plate-shaped regions of `binary` with the default geometry, cropped from `gray`.
pub fn extract_candidates(
    gray: ArrayView2<f32>,
    binary: ArrayView2<bool>,
) -> Vec<RegionCandidate> {
    RegionFilter::default().extract(gray, binary)
}

/// Whether `length` pixels lie within `range` fractions of `extent`, both ends inclusive.
///
/// Bounds are formed in `f64`: `0.15f32 * 400.0` already lands above 60.
pub(crate) fn within(length: usize, range: (f64, f64), extent: usize) -> bool {
    let (low, high) = (range.0 * extent as f64, range.1 * extent as f64);
    (low..=high).contains(&(length as f64))
}
