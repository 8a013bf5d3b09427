use std::env;

use anyhow::{bail, Context};
use serde::Serialize;
use serde_with::skip_serializing_none;
use tracing::{error, info};

use doodle_digits::logger;
use doodle_digits::{DigitClassifier, DigitPipeline, PipelineConfig, RecognitionStatus};

#[skip_serializing_none]
#[derive(Serialize)]
struct Report {
    status: String,
    digit: Option<u8>,
    scores: Option<Vec<f32>>,
}

fn main() -> anyhow::Result<()> {
    logger::init(logger::DEFAULT_DIRECTIVE);

    let mut args = env::args().skip(1);
    let (Some(model_path), Some(photo_path)) = (args.next(), args.next()) else {
        bail!("usage: doodle-digits <model.onnx> <photo> [config.json]");
    };

    let config = match args.next() {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("cannot load configuration from {path}"))?,
        None => PipelineConfig::default(),
    };
    info!("Ink polarity: {:?}", config.polarity);

    let pipeline = DigitPipeline::new(config)?;
    let classifier = DigitClassifier::load(&model_path);

    let outcome = classifier.classify_file(&pipeline, &photo_path);
    classifier.close();

    let status = RecognitionStatus::from_outcome(&outcome);
    let report = match &outcome {
        Ok(result) => Report {
            status: status.to_string(),
            digit: result.digit(),
            scores: (!result.is_failure()).then(|| result.scores.to_vec()),
        },
        Err(e) => {
            error!("Classification failed: {}", e);
            Report {
                status: status.to_string(),
                digit: None,
                scores: None,
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
