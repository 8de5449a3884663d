mod common;

use std::{path::Path, sync::atomic::Ordering};

use common::{FixedModel, RecordingMatcher, SequenceModel};
use image::{GrayImage, Luma};
use ndarray::Array2;
use platereader::{
    classifier::CharacterClassifier,
    model::{load_model, DEFAULT_ADAPTERS},
    template::{DirectoryTemplateMatcher, TemplateMatcher},
    PlateRecognizerBuilder, RecognitionError,
};

const TEMPLATES: &str = "training_data/train20X20";

fn crop() -> Array2<f32> {
    Array2::from_shape_fn((30, 14), |(r, c)| {
        if (4..26).contains(&r) && (2..12).contains(&c) {
            1.0
        } else {
            0.0
        }
    })
}

#[test]
fn low_confidence_confusable_uses_template_label() {
    common::init_logging();
    let model = FixedModel::new('0', 0.10);
    let matcher = RecordingMatcher::new('D');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let text = classifier.classify(&[crop()]).unwrap();

    assert_eq!(text.as_string(), "D");
    assert_eq!(text.characters[0].probability, 0.10);
    assert!(text.characters[0].template_matched);
    let calls = matcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].label, '0');
    assert_eq!(calls[0].shape, (20, 20));
    assert_eq!(calls[0].template_dir, Path::new(TEMPLATES));
}

#[test]
fn confident_confusable_keeps_prediction() {
    let model = FixedModel::new('0', 0.50);
    let matcher = RecordingMatcher::new('D');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let text = classifier.classify(&[crop()]).unwrap();

    assert_eq!(text.as_string(), "0");
    assert!(!text.characters[0].template_matched);
    assert!(matcher.calls().is_empty());
}

#[test]
fn threshold_is_strict() {
    let model = FixedModel::new('8', 0.15);
    let matcher = RecordingMatcher::new('B');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    assert_eq!(classifier.classify(&[crop()]).unwrap().as_string(), "8");
    assert!(matcher.calls().is_empty());
}

#[test]
fn unambiguous_labels_never_fall_back() {
    let model = FixedModel::new('K', 0.01);
    let matcher = RecordingMatcher::new('X');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    assert_eq!(classifier.classify(&[crop()]).unwrap().as_string(), "K");
    assert!(matcher.calls().is_empty());
}

#[test]
fn order_of_crops_is_preserved() {
    let model = SequenceModel::new("AB7C", 0.9);
    let matcher = RecordingMatcher::new('1');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let crops = vec![crop(); 4];
    let text = classifier.classify(&crops).unwrap();
    assert_eq!(text.len(), 4);
    assert_eq!(text.as_string(), "AB7C");
}

#[test]
fn unknown_label_is_a_classification_error() {
    let model = FixedModel::new('O', 0.9);
    let matcher = RecordingMatcher::new('0');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let err = classifier.classify(&[crop()]).unwrap_err();
    assert!(matches!(err, RecognitionError::Classification { .. }));
}

#[test]
fn probability_outside_unit_range_is_rejected() {
    for probability in [1.5, -0.2, f32::NAN] {
        let model = FixedModel::new('0', probability);
        let matcher = RecordingMatcher::new('D');
        let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

        let err = classifier.classify(&[crop()]).unwrap_err();
        assert!(
            matches!(err, RecognitionError::Classification { .. }),
            "{probability}: {err:?}"
        );
        assert!(matcher.calls().is_empty());
    }
}

#[test]
fn template_answer_outside_alphabet_is_rejected() {
    let model = FixedModel::new('5', 0.05);
    let matcher = RecordingMatcher::new('I');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let err = classifier.classify(&[crop()]).unwrap_err();
    assert!(matches!(err, RecognitionError::Classification { .. }));
}

#[test]
fn missing_model_is_reported_before_any_prediction() {
    let err = load_model("models/missing.onnx", DEFAULT_ADAPTERS, 1)
        .err()
        .expect("loading a missing model must fail");
    assert!(matches!(err, RecognitionError::ModelLoad { .. }));

    let err = PlateRecognizerBuilder::new()
        .model("models/missing.onnx")
        .build()
        .err()
        .expect("building without a model must fail");
    assert!(matches!(err, RecognitionError::ModelLoad { .. }));
}

#[test]
fn fallback_model_is_only_evaluated_once_per_character() {
    let model = FixedModel::new('2', 0.05);
    let matcher = RecordingMatcher::new('Z');
    let classifier = CharacterClassifier::new(&model, &matcher, Path::new(TEMPLATES));

    let text = classifier.classify(&[crop(), crop()]).unwrap();
    assert_eq!(text.as_string(), "ZZ");
    assert_eq!(model.evaluations.load(Ordering::SeqCst), 2);
    assert_eq!(matcher.calls().len(), 2);
}

fn save_template(dir: &Path, label: char, name: &str, ink: impl Fn(u32, u32) -> bool) {
    let dir = dir.join(label.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    let image = GrayImage::from_fn(20, 20, |x, y| {
        if ink(x, y) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });
    image.save(dir.join(name)).unwrap();
}

#[test]
fn directory_matcher_picks_closest_template() {
    common::init_logging();
    let templates = tempfile::tempdir().unwrap();
    let block = |x: u32, y: u32| (5..15).contains(&x) && (3..17).contains(&y);
    let ring = |x: u32, y: u32| block(x, y) && !((7..13).contains(&x) && (5..15).contains(&y));
    save_template(templates.path(), '0', "0_1.png", ring);
    save_template(templates.path(), 'D', "D_1.png", block);

    let character = Array2::from_shape_fn((20, 20), |(y, x)| {
        if block(x as u32, y as u32) {
            1.0f32
        } else {
            0.0
        }
    });
    let matched = DirectoryTemplateMatcher
        .match_template('0', character.view(), templates.path())
        .unwrap();
    assert_eq!(matched, 'D');

    let hollow = Array2::from_shape_fn((20, 20), |(y, x)| {
        if ring(x as u32, y as u32) {
            1.0f32
        } else {
            0.0
        }
    });
    let matched = DirectoryTemplateMatcher
        .match_template('D', hollow.view(), templates.path())
        .unwrap();
    assert_eq!(matched, '0');
}
