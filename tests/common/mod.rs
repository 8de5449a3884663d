#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};
use platereader::{
    classifier::{alphabet_index, CharacterModel, ALPHABET},
    template::TemplateMatcher,
    GrayArray, Result,
};

pub const SCENE_HEIGHT: u32 = 300;
pub const SCENE_WIDTH: u32 = 400;
/// Plate box in the scene: top row, left column, height, width.
pub const PLATE: (u32, u32, u32, u32) = (200, 100, 36, 120);
/// Character boxes inside the plate: top row and left column, 18 rows by 8 columns each. The
/// rightmost character starts highest, so it is labeled first.
pub const CHARACTERS: [(u32, u32); 3] = [(9, 15), (9, 45), (7, 80)];

const PLATE_PAPER: u8 = 230;
const INK: u8 = 0;
const INK_EDGE: u8 = 64;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dark vehicle with one light plate carrying [`CHARACTERS`] in dark ink.
pub fn vehicle_scene(with_characters: bool) -> GrayImage {
    let (top, left, height, width) = PLATE;
    let mut image = GrayImage::from_pixel(SCENE_WIDTH, SCENE_HEIGHT, Luma([0]));
    for y in top..top + height {
        for x in left..left + width {
            image.put_pixel(x, y, Luma([PLATE_PAPER]));
        }
    }
    if with_characters {
        for (row, col) in CHARACTERS {
            for x in left + col..left + col + 8 {
                // anti-aliased top edge, keeps Otsu above the ink level on the plate crop
                image.put_pixel(x, top + row - 1, Luma([INK_EDGE]));
                for y in top + row..top + row + 18 {
                    image.put_pixel(x, y, Luma([INK]));
                }
            }
        }
    }
    image
}

/// Light plate crop with `strokes` dark vertical bars of 3 x 16 pixels, each under a lighter
/// edge row.
pub fn plate_crop(strokes: usize) -> GrayArray {
    let mut crop = Array2::from_elem((20, 60), 0.9f32);
    for i in 0..strokes {
        let col = 4 + i * 9;
        for c in col..col + 3 {
            crop[[1, c]] = 0.25;
            for r in 2..18 {
                crop[[r, c]] = 0.0;
            }
        }
    }
    crop
}

/// Same binary image as gray samples.
pub fn as_gray(binary: ArrayView2<bool>) -> GrayArray {
    binary.mapv(|it| if it { 1.0 } else { 0.0 })
}

fn probabilities_for(label: char, probability: f32) -> Vec<f32> {
    let rest = (1.0 - probability) / (ALPHABET.len() - 1) as f32;
    let mut probabilities = vec![rest; ALPHABET.len()];
    if let Some(index) = alphabet_index(label) {
        probabilities[index] = probability;
    }
    probabilities
}

/// Predicts the same label with the same confidence for every input.
pub struct FixedModel {
    pub label: char,
    pub probability: f32,
    pub evaluations: AtomicUsize,
}

impl FixedModel {
    pub fn new(label: char, probability: f32) -> Self {
        Self {
            label,
            probability,
            evaluations: AtomicUsize::new(0),
        }
    }
}

impl CharacterModel for FixedModel {
    fn predict(&self, _features: ArrayView2<f32>) -> Result<char> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        Ok(self.label)
    }

    fn predict_proba(&self, _features: ArrayView2<f32>) -> Result<Vec<f32>> {
        Ok(probabilities_for(self.label, self.probability))
    }
}

/// Predicts `labels` in turn, one per evaluated character.
pub struct SequenceModel {
    pub labels: Vec<char>,
    pub probability: f32,
    calls: AtomicUsize,
}

impl SequenceModel {
    pub fn new(labels: &str, probability: f32) -> Self {
        Self {
            labels: labels.chars().collect(),
            probability,
            calls: AtomicUsize::new(0),
        }
    }
}

impl CharacterModel for SequenceModel {
    fn predict(&self, features: ArrayView2<f32>) -> Result<char> {
        self.evaluate(features).map(|(label, _)| label)
    }

    fn predict_proba(&self, features: ArrayView2<f32>) -> Result<Vec<f32>> {
        self.evaluate(features).map(|(_, probabilities)| probabilities)
    }

    fn evaluate(&self, _features: ArrayView2<f32>) -> Result<(char, Vec<f32>)> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let label = self.labels[call % self.labels.len()];
        Ok((label, probabilities_for(label, self.probability)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCall {
    pub label: char,
    pub shape: (usize, usize),
    pub template_dir: PathBuf,
}

/// Answers every template query with `answer` and remembers what it was asked.
pub struct RecordingMatcher {
    pub answer: char,
    pub calls: Mutex<Vec<TemplateCall>>,
}

impl RecordingMatcher {
    pub fn new(answer: char) -> Self {
        Self {
            answer,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TemplateCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TemplateMatcher for RecordingMatcher {
    fn match_template(
        &self,
        label: char,
        image: ArrayView2<f32>,
        template_dir: &Path,
    ) -> Result<char> {
        self.calls.lock().unwrap().push(TemplateCall {
            label,
            shape: image.dim(),
            template_dir: template_dir.to_path_buf(),
        });
        Ok(self.answer)
    }
}
