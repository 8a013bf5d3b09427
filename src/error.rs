use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to decode photograph: {0}")]
    Decode(String),

    #[error("Failed to read orientation metadata: {0}")]
    Metadata(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Stage {stage} cannot consume a {found} image")]
    UnexpectedInput {
        stage: &'static str,
        found: &'static str,
    },

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(u32, u32),

    #[error("Failed to load classifier model: {0}")]
    ModelLoad(String),

    #[error("Classifier model is not available")]
    ModelUnavailable,

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
