use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::instrument;

use crate::{
    error::{RecognitionError, Result},
    result::{ClassificationResult, GrayArray, RecognizedText},
    template::TemplateMatcher,
    util::resize_gray,
};

pub const CHARACTER_SHAPE: (usize, usize) = (20, 20);
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;

/// Plate characters in model output order. `I` and `O` never appear on plates.
pub const ALPHABET: [char; 34] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J',
    'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Look-alike characters the statistical model tends to mix up.
pub const CONFUSABLE_GROUPS: &[&[char]] = &[
    &['0', 'D', 'Q'],
    &['8', 'B'],
    &['5', 'S'],
    &['2', 'Z'],
    &['1', '7'],
];

pub fn alphabet_index(label: char) -> Option<usize> {
    ALPHABET.iter().position(|it| *it == label)
}

pub fn confusable_group(label: char) -> Option<&'static [char]> {
    CONFUSABLE_GROUPS
        .iter()
        .copied()
        .find(|group| group.contains(&label))
}

pub fn is_confusable(label: char) -> bool {
    confusable_group(label).is_some()
}

/// A trained character classifier over flattened `1 x N` feature rows.
///
/// Implementations are shared between runs and must not change state while predicting.
pub trait CharacterModel: Send + Sync {
    fn predict(&self, features: ArrayView2<f32>) -> Result<char>;

    /// Class probabilities indexed like [`ALPHABET`].
    fn predict_proba(&self, features: ArrayView2<f32>) -> Result<Vec<f32>>;

    fn evaluate(&self, features: ArrayView2<f32>) -> Result<(char, Vec<f32>)> {
        Ok((self.predict(features)?, self.predict_proba(features)?))
    }
}

pub struct CharacterClassifier<'a> {
    pub model: &'a dyn CharacterModel,
    pub matcher: &'a dyn TemplateMatcher,
    pub template_dir: &'a Path,
    pub target_shape: (usize, usize),
    pub confidence_threshold: f32,
}

impl<'a> CharacterClassifier<'a> {
    pub fn new(
        model: &'a dyn CharacterModel,
        matcher: &'a dyn TemplateMatcher,
        template_dir: &'a Path,
    ) -> Self {
        Self {
            model,
            matcher,
            template_dir,
            target_shape: CHARACTER_SHAPE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Classifies every crop, keeping the order they were given in.
    #[instrument(level = "debug", skip(self, crops), fields(count = crops.len()))]
    pub fn classify(&self, crops: &[GrayArray]) -> Result<RecognizedText> {
        let characters = crops
            .iter()
            .map(|crop| self.classify_one(crop.view()))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecognizedText { characters })
    }

    #[instrument(level = "trace", skip(self, crop))]
    fn classify_one(&self, crop: ArrayView2<f32>) -> Result<ClassificationResult> {
        let resized = resize_gray(crop, self.target_shape);
        let features = flatten(&resized);
        let (label, probabilities) = self.model.evaluate(features.view())?;

        let index = alphabet_index(label).ok_or_else(|| {
            RecognitionError::classification(format!("model predicted unknown label {label:?}"))
        })?;
        let probability = *probabilities.get(index).ok_or_else(|| {
            RecognitionError::classification(format!(
                "probability vector has {} entries, label {label:?} needs index {index}",
                probabilities.len()
            ))
        })?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(RecognitionError::classification(format!(
                "probability {probability} for {label:?} is outside [0, 1]"
            )));
        }

        if !is_confusable(label) || probability >= self.confidence_threshold {
            return Ok(ClassificationResult {
                label,
                probability,
                template_matched: false,
            });
        }

        let matched = self
            .matcher
            .match_template(label, resized.view(), self.template_dir)?;
        if alphabet_index(matched).is_none() {
            return Err(RecognitionError::classification(format!(
                "template matching returned unknown label {matched:?}"
            )));
        }
        log::debug!(
            "Low confidence {probability} for {label:?}, template matching chose {matched:?}"
        );
        Ok(ClassificationResult {
            label: matched,
            probability,
            template_matched: true,
        })
    }
}

/// Row-major `1 x (rows * cols)` feature row.
pub fn flatten(image: &GrayArray) -> Array2<f32> {
    image
        .iter()
        .copied()
        .collect::<Array1<f32>>()
        .insert_axis(Axis(0))
}
