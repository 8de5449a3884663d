use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::instrument;

pub mod classifier;
mod error;
pub mod model;
pub mod normalize;
pub mod plate;
pub mod region;
mod result;
pub mod segment;
pub mod template;
pub mod text;
pub mod util;

use classifier::{
    CharacterClassifier, CharacterModel, CHARACTER_SHAPE, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use error::*;
use model::{load_model, ModelAdapter, DEFAULT_ADAPTERS};
use normalize::DEFAULT_MAX_WIDTH;
use plate::{select_plate, DEFAULT_INVERTED_THRESHOLD_OFFSET};
use region::RegionFilter;
pub use result::*;
use segment::{ComponentSegmenter, Segmenter};
use template::{DirectoryTemplateMatcher, TemplateMatcher};
use text::{ColumnOrderReconstructor, TextReconstructor};

pub use ort as runtime;

/// States of a recognition run, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    Localized,
    Segmented,
    Classified,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionOptions {
    pub max_width: usize,
    pub region: RegionFilter,
    pub inverted_threshold_offset: f32,
    pub character_shape: (usize, usize),
    pub confidence_threshold: f32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            region: RegionFilter::default(),
            inverted_threshold_offset: DEFAULT_INVERTED_THRESHOLD_OFFSET,
            character_shape: CHARACTER_SHAPE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

pub struct PlateRecognizerBuilder {
    threads: usize,
    model_path: Option<PathBuf>,
    template_dir: Option<PathBuf>,
    adapters: Vec<ModelAdapter>,
    options: RecognitionOptions,
    segmenter: Box<dyn Segmenter>,
    matcher: Box<dyn TemplateMatcher>,
    reconstructor: Box<dyn TextReconstructor>,
}

impl PlateRecognizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn template_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(path.into());
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = ModelAdapter>) -> Self {
        self.adapters = adapters.into_iter().collect();
        self
    }

    pub fn options(mut self, options: RecognitionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn segmenter(mut self, segmenter: impl Segmenter + 'static) -> Self {
        self.segmenter = Box::new(segmenter);
        self
    }

    pub fn template_matcher(mut self, matcher: impl TemplateMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn text_reconstructor(mut self, reconstructor: impl TextReconstructor + 'static) -> Self {
        self.reconstructor = Box::new(reconstructor);
        self
    }

    /// Loads the model artifact and assembles the recognizer.
    #[instrument(skip(self))]
    pub fn build(mut self) -> Result<PlateRecognizer> {
        let model_path = self
            .model_path
            .take()
            .unwrap_or_else(|| "models/svc_model.onnx".into());
        let model = load_model(model_path, &self.adapters, self.threads)?;
        Ok(self.build_with_model(model))
    }

    /// Assembles the recognizer around an already loaded model.
    pub fn build_with_model(self, model: impl CharacterModel + 'static) -> PlateRecognizer {
        PlateRecognizer {
            model: Box::new(model),
            template_dir: self
                .template_dir
                .unwrap_or_else(|| "training_data/train20X20".into()),
            options: self.options,
            segmenter: self.segmenter,
            matcher: self.matcher,
            reconstructor: self.reconstructor,
        }
    }
}

impl Default for PlateRecognizerBuilder {
    fn default() -> Self {
        Self {
            threads: 1,
            model_path: None,
            template_dir: None,
            adapters: DEFAULT_ADAPTERS.to_vec(),
            options: RecognitionOptions::default(),
            segmenter: Box::new(ComponentSegmenter::default()),
            matcher: Box::new(DirectoryTemplateMatcher),
            reconstructor: Box::new(ColumnOrderReconstructor),
        }
    }
}

/// Runs the recognition pipeline. Holds only read-only state, so one recognizer can serve
/// concurrent runs.
pub struct PlateRecognizer {
    model: Box<dyn CharacterModel>,
    template_dir: PathBuf,
    options: RecognitionOptions,
    segmenter: Box<dyn Segmenter>,
    matcher: Box<dyn TemplateMatcher>,
    reconstructor: Box<dyn TextReconstructor>,
}

impl PlateRecognizer {
    pub fn options(&self) -> &RecognitionOptions {
        &self.options
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn recognize_path(&self, path: impl AsRef<Path>) -> Result<PlateReading> {
        let (gray, binary) = normalize::load_and_normalize(path, self.options.max_width)?;
        self.run(gray, binary)
    }

    #[instrument(skip(self, image))]
    pub fn recognize_image(&self, image: &DynamicImage) -> Result<PlateReading> {
        let (gray, binary) = normalize::normalize(image, self.options.max_width);
        self.run(gray, binary)
    }

    fn run(&self, gray: GrayArray, binary: BinaryArray) -> Result<PlateReading> {
        log::debug!("{:?}: {}x{} image", Stage::Loaded, gray.ncols(), gray.nrows());

        let candidates = self.options.region.extract(gray.view(), binary.view());
        let plate = select_plate(&candidates, self.options.inverted_threshold_offset)?;
        log::debug!("{:?}: plate at {:?}", Stage::Localized, plate.bounds);

        let segmentation = self.segmenter.segment(&plate)?;
        if segmentation.fullscale.is_empty() {
            return Err(RecognitionError::NoCharacterSegmented);
        }
        log::debug!(
            "{:?}: {} character(s)",
            Stage::Segmented,
            segmentation.fullscale.len()
        );

        let classifier = CharacterClassifier {
            model: &*self.model,
            matcher: &*self.matcher,
            template_dir: &self.template_dir,
            target_shape: self.options.character_shape,
            confidence_threshold: self.options.confidence_threshold,
        };
        let characters = classifier.classify(&segmentation.fullscale)?;
        let classified = characters.as_string();
        log::debug!("{:?}: {classified:?}", Stage::Classified);

        let text = self
            .reconstructor
            .reconstruct(&classified, &segmentation.columns);
        if text.is_empty() {
            return Err(RecognitionError::NoCharacterSegmented);
        }

        Ok(PlateReading {
            text,
            characters,
            bounds: plate.bounds,
        })
    }
}
