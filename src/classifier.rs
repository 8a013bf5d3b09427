use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, GrayImage};
use tract_onnx::prelude::*;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::DigitPipeline;
use crate::tensor::EncodedTensor;
use crate::{CLASS_COUNT, MODEL_SIDE};

/// `predicted_class` of a classification that could not run.
pub const FAILED_CLASS: i32 = -1;

type TractSimplePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Anything that scores an encoded digit against the ten classes.
pub trait ScoreModel: Send {
    fn predict(&self, tensor: &EncodedTensor) -> Result<Vec<f32>>;
}

/// ONNX classifier with input `f32 [1, 28, 28, 1]` and output `f32 [1, 10]`.
pub struct TractModel {
    plan: TractSimplePlan,
}

impl TractModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::ModelLoad(format!(
                "{} is not found",
                path.display()
            )));
        }
        let side = MODEL_SIDE as usize;
        let input_shape = tvec!(1, side, side, 1);
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input_shape))
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Ok(Self { plan })
    }
}

impl ScoreModel for TractModel {
    fn predict(&self, tensor: &EncodedTensor) -> Result<Vec<f32>> {
        let input = tensor.to_tract()?;
        let result = self
            .plan
            .run(tvec!(input))
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let output = result
            .first()
            .ok_or_else(|| PipelineError::Inference("model produced no output".to_string()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| PipelineError::Inference(e.to_string()))?
            .iter()
            .cloned()
            .collect();
        Ok(scores)
    }
}

/// Outcome of one classification call.
#[derive(Clone, Debug)]
pub struct ClassificationResult {
    /// Digit 0-9, or [`FAILED_CLASS`] when no model was available.
    pub predicted_class: i32,
    pub scores: [f32; CLASS_COUNT],
    /// The raster the model saw.
    pub processed_image: GrayImage,
}

impl ClassificationResult {
    pub fn digit(&self) -> Option<u8> {
        u8::try_from(self.predicted_class).ok()
    }

    pub fn is_failure(&self) -> bool {
        self.predicted_class == FAILED_CLASS
    }
}

/// What a user is told about a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognitionStatus {
    Recognized(u8),
    RecognitionFailed,
    ImageCorrupted,
}

impl RecognitionStatus {
    pub fn from_outcome(outcome: &Result<ClassificationResult>) -> Self {
        match outcome {
            Ok(result) => match result.digit() {
                Some(digit) => RecognitionStatus::Recognized(digit),
                None => RecognitionStatus::RecognitionFailed,
            },
            Err(PipelineError::Decode(_)) => RecognitionStatus::ImageCorrupted,
            Err(_) => RecognitionStatus::RecognitionFailed,
        }
    }
}

impl fmt::Display for RecognitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionStatus::Recognized(digit) => write!(f, "{digit}"),
            RecognitionStatus::RecognitionFailed => write!(f, "recognition failed"),
            RecognitionStatus::ImageCorrupted => write!(f, "image corrupted"),
        }
    }
}

/// Index of the largest score; the first one wins ties and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Process-lifetime handle on the digit model.
///
/// A classifier whose model failed to load stays usable but disabled: every
/// call reports [`FAILED_CLASS`]. The model is released by [`close`](Self::close)
/// or when the classifier is dropped.
pub struct DigitClassifier {
    model: Option<Mutex<Box<dyn ScoreModel>>>,
}

impl DigitClassifier {
    /// Loads an ONNX model; failure is logged once and yields a disabled classifier.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match TractModel::load(path) {
            Ok(model) => {
                info!("Digit model loaded");
                Self::with_model(model)
            }
            Err(e) => {
                error!("Error loading digit model: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn with_model<M: ScoreModel + 'static>(model: M) -> Self {
        Self {
            model: Some(Mutex::new(Box::new(model))),
        }
    }

    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Scores an encoded digit. Fails with `ModelUnavailable` when disabled.
    pub fn scores(&self, tensor: &EncodedTensor) -> Result<[f32; CLASS_COUNT]> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelUnavailable)?;
        let raw = {
            let guard = model
                .lock()
                .map_err(|_| PipelineError::Inference("model lock poisoned".to_string()))?;
            guard.predict(tensor)?
        };
        <[f32; CLASS_COUNT]>::try_from(raw.as_slice()).map_err(|_| {
            PipelineError::Inference(format!(
                "expected {} scores, model produced {}",
                CLASS_COUNT,
                raw.len()
            ))
        })
    }

    /// Preprocesses an upright image and classifies it.
    pub fn classify(
        &self,
        pipeline: &DigitPipeline,
        image: &DynamicImage,
    ) -> Result<ClassificationResult> {
        let digit = pipeline.process(image)?;
        self.decide(digit.image, &digit.tensor)
    }

    /// Orientation correction from `source`, preprocessing, classification.
    pub fn classify_photo<P: AsRef<Path>>(
        &self,
        pipeline: &DigitPipeline,
        image: &DynamicImage,
        source: P,
    ) -> Result<ClassificationResult> {
        info!(
            "Received image for classification (Size: {}x{})",
            image.width(),
            image.height()
        );
        let digit = pipeline.process_photo(image, source)?;
        self.decide(digit.image, &digit.tensor)
    }

    /// Decodes the photograph at `path` and classifies it.
    pub fn classify_file<P: AsRef<Path>>(
        &self,
        pipeline: &DigitPipeline,
        path: P,
    ) -> Result<ClassificationResult> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| PipelineError::Decode(format!("{}: {}", path.display(), e)))?;
        self.classify_photo(pipeline, &image, path)
    }

    fn decide(
        &self,
        processed_image: GrayImage,
        tensor: &EncodedTensor,
    ) -> Result<ClassificationResult> {
        let scores = match self.scores(tensor) {
            Ok(scores) => scores,
            Err(PipelineError::ModelUnavailable) => {
                warn!("Classification requested without a model");
                return Ok(ClassificationResult {
                    predicted_class: FAILED_CLASS,
                    scores: [0.0; CLASS_COUNT],
                    processed_image,
                });
            }
            Err(e) => return Err(e),
        };

        let predicted_class = argmax(&scores).map_or(FAILED_CLASS, |i| i as i32);
        info!("Model output: {:?}", scores);
        info!("Recognized digit: {}", predicted_class);

        Ok(ClassificationResult {
            predicted_class,
            scores,
            processed_image,
        })
    }

    /// Releases the model explicitly.
    pub fn close(mut self) {
        if self.model.take().is_some() {
            info!("Digit model released");
        }
    }
}

impl Drop for DigitClassifier {
    fn drop(&mut self) {
        if self.model.take().is_some() {
            info!("Digit model released on drop");
        }
    }
}
