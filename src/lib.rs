//! Handwritten digit recognition from photographs.
//!
//! A captured photo is rotated upright, binarized with Otsu's method, reduced
//! to its largest connected stroke, cropped, closed, deskewed and scaled onto a
//! 28x28 canvas before a fixed ONNX classifier scores the ten digits.

pub mod binarize;
pub mod classifier;
pub mod components;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logger;
pub mod morphology;
pub mod orientation;
pub mod pipeline;
pub mod tensor;
pub mod transformer;

pub use classifier::{
    ClassificationResult, DigitClassifier, RecognitionStatus, ScoreModel, TractModel, FAILED_CLASS,
};
pub use config::{InkPolarity, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Result};
pub use pipeline::{DigitPipeline, ProcessedDigit};
pub use tensor::EncodedTensor;

/// Side of the square raster the classifier consumes.
pub const MODEL_SIDE: u32 = 28;
pub const MODEL_PIXELS: usize = (MODEL_SIDE * MODEL_SIDE) as usize;
/// Longer side of the digit inside the model raster; the rest is margin.
pub const CONTENT_SIDE: u32 = 20;
pub const CLASS_COUNT: usize = 10;
