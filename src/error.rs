use std::path::PathBuf;

use thiserror::Error;

use crate::Stage;

pub type Result<T> = std::result::Result<T, RecognitionError>;

/// Failure kinds of a recognition run. Every variant is terminal for the run that produced it.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("failed to load image {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("license plate could not be located")]
    NoPlateFound,

    #[error("no character was segmented")]
    NoCharacterSegmented,

    #[error("failed to load model {}: {reason}", path.display())]
    ModelLoad {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<ort::Error>,
    },

    #[error("classification failed: {message}")]
    Classification {
        message: String,
        #[source]
        source: Option<ort::Error>,
    },
}

impl RecognitionError {
    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification {
            message: message.into(),
            source: None,
        }
    }

    pub fn inference(message: impl Into<String>, source: ort::Error) -> Self {
        Self::Classification {
            message: message.into(),
            source: Some(source),
        }
    }

    /// The pipeline stage the run was trying to reach when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Load { .. } => Stage::Loaded,
            Self::NoPlateFound => Stage::Localized,
            Self::NoCharacterSegmented => Stage::Segmented,
            Self::ModelLoad { .. } | Self::Classification { .. } => Stage::Classified,
        }
    }
}
