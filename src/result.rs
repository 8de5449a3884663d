use ndarray::{Array2, ArrayView2};

/// Grayscale samples in `[0, 1]`, indexed `[row, col]`.
pub type GrayArray = Array2<f32>;
/// Thresholded image, same shape as the image it was derived from.
pub type BinaryArray = Array2<bool>;

/// Half-open pixel box: `min_*` inclusive, `max_*` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BoundingBox {
    pub fn height(&self) -> usize {
        self.max_row - self.min_row
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col
    }
}

#[derive(Debug, Clone)]
pub struct RegionCandidate {
    pub bounds: BoundingBox,
    pub image: GrayArray,
}

/// Binarized plate region with characters as foreground.
#[derive(Debug, Clone)]
pub struct PlateImage {
    pub bounds: BoundingBox,
    pub binary: BinaryArray,
}

impl PlateImage {
    pub fn view(&self) -> ArrayView2<bool> {
        self.binary.view()
    }
}

/// Output of the character segmentation stage. `fullscale[i]` was found at column `columns[i]`.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub fullscale: Vec<GrayArray>,
    pub columns: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: char,
    pub probability: f32,
    /// The statistical label was replaced by template matching.
    pub template_matched: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecognizedText {
    pub characters: Vec<ClassificationResult>,
}

impl RecognizedText {
    pub fn as_string(&self) -> String {
        self.characters.iter().map(|it| it.label).collect()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PlateReading {
    pub text: String,
    pub characters: RecognizedText,
    pub bounds: BoundingBox,
}
