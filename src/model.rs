use std::path::Path;

use ndarray::ArrayView2;
use ort::{inputs, DynValue, GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::{
    classifier::{CharacterModel, ALPHABET},
    error::{RecognitionError, Result},
};

/// Output layouts of exported character classifiers, tried in order when loading a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAdapter {
    /// skl2onnx export with the probability ZipMap disabled.
    Sklearn,
    /// Older onnxmltools exports.
    OnnxMlTools,
    /// Any graph with exactly two outputs, label first.
    Positional,
}

pub const DEFAULT_ADAPTERS: &[ModelAdapter] = &[
    ModelAdapter::Sklearn,
    ModelAdapter::OnnxMlTools,
    ModelAdapter::Positional,
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputBinding {
    label: String,
    probabilities: String,
}

impl ModelAdapter {
    fn bind(&self, outputs: &[String]) -> Option<OutputBinding> {
        match self {
            Self::Sklearn => bind_named(outputs, "label", "probabilities"),
            Self::OnnxMlTools => bind_named(outputs, "output_label", "output_probability"),
            Self::Positional => match outputs {
                [label, probabilities] => Some(OutputBinding {
                    label: label.clone(),
                    probabilities: probabilities.clone(),
                }),
                _ => None,
            },
        }
    }
}

fn bind_named(outputs: &[String], label: &str, probabilities: &str) -> Option<OutputBinding> {
    let has = |name: &str| outputs.iter().any(|it| it == name);
    (has(label) && has(probabilities)).then(|| OutputBinding {
        label: label.to_string(),
        probabilities: probabilities.to_string(),
    })
}

/// Character classifier exported to ONNX, evaluated with a single session run per character.
pub struct OnnxCharacterModel {
    session: Session,
    input_name: String,
    outputs: OutputBinding,
    adapter: ModelAdapter,
}

/// Loads a model artifact, binding it through the first adapter whose layout the graph exposes.
///
/// A missing file is reported before any session is created.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_model(
    path: impl AsRef<Path>,
    adapters: &[ModelAdapter],
    threads: usize,
) -> Result<OnnxCharacterModel> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RecognitionError::model_load(path, "model file does not exist"));
    }

    let session = open_session(path, threads).map_err(|source| RecognitionError::ModelLoad {
        path: path.to_path_buf(),
        reason: "model could not be deserialized".to_string(),
        source: Some(source),
    })?;
    log::debug!("Character model inputs: {:?}", session.inputs);
    log::debug!("Character model outputs: {:?}", session.outputs);

    let input_name = session
        .inputs
        .first()
        .map(|it| it.name.clone())
        .ok_or_else(|| RecognitionError::model_load(path, "model has no inputs"))?;
    let output_names = session
        .outputs
        .iter()
        .map(|it| it.name.clone())
        .collect::<Vec<_>>();
    let (adapter, outputs) = adapters
        .iter()
        .find_map(|adapter| adapter.bind(&output_names).map(|it| (*adapter, it)))
        .ok_or_else(|| {
            RecognitionError::model_load(
                path,
                format!("no compatible output layout among {output_names:?}"),
            )
        })?;
    log::debug!("Bound character model outputs with {adapter:?}");

    Ok(OnnxCharacterModel {
        session,
        input_name,
        outputs,
        adapter,
    })
}

fn open_session(path: &Path, threads: usize) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(threads)?
        .commit_from_file(path)
}

impl OnnxCharacterModel {
    pub fn adapter(&self) -> ModelAdapter {
        self.adapter
    }

    #[instrument(level = "trace", skip(self, features))]
    fn run(&self, features: ArrayView2<f32>) -> Result<(char, Vec<f32>)> {
        let inputs = inputs![self.input_name.as_str() => features.to_owned()]
            .map_err(|err| RecognitionError::inference("invalid feature tensor", err))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|err| RecognitionError::inference("model run failed", err))?;

        let label = outputs
            .get(self.outputs.label.as_str())
            .ok_or_else(|| RecognitionError::classification("label output missing"))?;
        let label = decode_label(label)?;

        let probabilities = outputs
            .get(self.outputs.probabilities.as_str())
            .ok_or_else(|| RecognitionError::classification("probability output missing"))?
            .try_extract_tensor::<f32>()
            .map_err(|err| RecognitionError::inference("probabilities are not f32", err))?;
        log::trace!("Probability tensor size: {:?}", probabilities.dim());

        Ok((label, probabilities.iter().copied().collect()))
    }
}

/// Labels come either as class name strings or as indices into [`ALPHABET`].
fn decode_label(value: &DynValue) -> Result<char> {
    if let Ok(labels) = value.try_extract_string_tensor() {
        let label = labels
            .iter()
            .next()
            .ok_or_else(|| RecognitionError::classification("empty label output"))?;
        let mut chars = label.chars();
        return match (chars.next(), chars.next()) {
            (Some(label), None) => Ok(label),
            _ => Err(RecognitionError::classification(format!(
                "label {label:?} is not a single character"
            ))),
        };
    }

    let indices = value
        .try_extract_tensor::<i64>()
        .map_err(|err| {
            RecognitionError::inference("label output is neither string nor int64", err)
        })?;
    let index = indices
        .iter()
        .next()
        .copied()
        .ok_or_else(|| RecognitionError::classification("empty label output"))?;
    usize::try_from(index)
        .ok()
        .and_then(|index| ALPHABET.get(index).copied())
        .ok_or_else(|| {
            RecognitionError::classification(format!("label index {index} out of range"))
        })
}

impl CharacterModel for OnnxCharacterModel {
    fn predict(&self, features: ArrayView2<f32>) -> Result<char> {
        self.run(features).map(|(label, _)| label)
    }

    fn predict_proba(&self, features: ArrayView2<f32>) -> Result<Vec<f32>> {
        self.run(features).map(|(_, probabilities)| probabilities)
    }

    fn evaluate(&self, features: ArrayView2<f32>) -> Result<(char, Vec<f32>)> {
        self.run(features)
    }
}
