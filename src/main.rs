use std::{path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use platereader::{PlateRecognizerBuilder, RecognitionError, RecognitionOptions};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser)]
#[command(name = "platereader")]
#[command(about = "Read the license plate in a vehicle photograph")]
struct Cli {
    /// Path to the vehicle image
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Exported character classifier
    #[arg(long, value_name = "FILE", default_value = "models/svc_model.onnx")]
    model: PathBuf,

    /// Directory of per-character reference images used for low-confidence characters
    #[arg(long, value_name = "DIR", default_value = "training_data/train20X20")]
    templates: PathBuf,

    /// Images wider than this are scaled down before localization
    #[arg(long, default_value_t = 600)]
    max_width: usize,

    /// Confidence below which confusable characters go through template matching
    #[arg(long, default_value_t = 0.15)]
    confidence: f32,

    #[arg(long, default_value_t = 1)]
    threads: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    let options = RecognitionOptions {
        max_width: args.max_width,
        confidence_threshold: args.confidence,
        ..RecognitionOptions::default()
    };

    let start = Instant::now();
    let result = PlateRecognizerBuilder::new()
        .model(&args.model)
        .template_dir(&args.templates)
        .threads(args.threads)
        .options(options)
        .build()
        .and_then(|recognizer| recognizer.recognize_path(&args.image_path));
    log::debug!("Recognition took {:?}", start.elapsed());

    match result {
        Ok(reading) => {
            println!("{}", reading.text);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", describe(&err));
            ExitCode::from(exit_code(&err))
        }
    }
}

fn describe(err: &RecognitionError) -> String {
    match err {
        RecognitionError::Load { .. } => format!("Error loading image: {err}"),
        RecognitionError::NoPlateFound => "License plate could not be located".to_string(),
        RecognitionError::NoCharacterSegmented => "No character was segmented".to_string(),
        RecognitionError::ModelLoad { .. } => format!("Character model unavailable: {err}"),
        RecognitionError::Classification { .. } => format!("Error during classification: {err}"),
    }
}

fn exit_code(err: &RecognitionError) -> u8 {
    match err {
        RecognitionError::Load { .. } => 2,
        RecognitionError::NoPlateFound => 3,
        RecognitionError::NoCharacterSegmented => 4,
        RecognitionError::ModelLoad { .. } => 5,
        RecognitionError::Classification { .. } => 6,
    }
}
