use std::path::Path;

use image::imageops::FilterType;
use image::Luma;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::{CONTENT_SIDE, MODEL_SIDE};

/// Which side of the Otsu threshold holds the pen strokes.
///
/// The choice also fixes the two sentinel colours of a binarized raster: the
/// foreground sentinel is the colour the ink had in the photograph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InkPolarity {
    /// Dark pen on light paper. Ink is black (0), paper is white (255).
    #[default]
    DarkInk,
    /// Light strokes on a dark ground. Ink is white (255), ground is black (0).
    LightInk,
}

impl InkPolarity {
    pub fn foreground(self) -> Luma<u8> {
        match self {
            InkPolarity::DarkInk => Luma([0]),
            InkPolarity::LightInk => Luma([255]),
        }
    }

    pub fn background(self) -> Luma<u8> {
        match self {
            InkPolarity::DarkInk => Luma([255]),
            InkPolarity::LightInk => Luma([0]),
        }
    }

    /// Classifies a grayscale intensity against a threshold.
    pub fn is_ink(self, intensity: u8, threshold: u8) -> bool {
        match self {
            InkPolarity::DarkInk => intensity <= threshold,
            InkPolarity::LightInk => intensity > threshold,
        }
    }

    #[inline]
    pub fn is_foreground(self, pixel: &Luma<u8>) -> bool {
        pixel[0] == self.foreground()[0]
    }

    /// Ink density in `[0, 1]` of an arbitrary grayscale value.
    pub fn ink_density(self, intensity: u8) -> f32 {
        let v = intensity as f32 / 255.0;
        match self {
            InkPolarity::DarkInk => 1.0 - v,
            InkPolarity::LightInk => v,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "FilterType")]
pub(crate) enum FilterOption {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub polarity: InkPolarity,
    /// Longer side of the digit after scaling.
    pub content_size: u32,
    /// Side of the square output canvas.
    pub canvas_size: u32,
    /// Deskew is skipped when the estimated angle reaches this magnitude.
    pub max_skew_degrees: f64,
    pub close_strokes: bool,
    pub deskew: bool,
    #[serde(with = "FilterOption")]
    pub resize_filter: FilterType,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            polarity: InkPolarity::default(),
            content_size: CONTENT_SIDE,
            canvas_size: MODEL_SIDE,
            max_skew_degrees: 30.0,
            close_strokes: true,
            deskew: true,
            resize_filter: FilterType::Triangle,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas_size == 0 || self.content_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "canvas and content sizes must be positive".to_string(),
            ));
        }
        if self.content_size > self.canvas_size {
            return Err(PipelineError::InvalidConfig(format!(
                "content size {} exceeds canvas size {}",
                self.content_size, self.canvas_size
            )));
        }
        if self.canvas_size != MODEL_SIDE {
            return Err(PipelineError::InvalidConfig(format!(
                "canvas size must match the model input side {}, got {}",
                MODEL_SIDE, self.canvas_size
            )));
        }
        if !self.max_skew_degrees.is_finite() || self.max_skew_degrees < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "skew ceiling must be a non-negative number of degrees, got {}",
                self.max_skew_degrees
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn polarity(mut self, polarity: InkPolarity) -> Self {
        self.config.polarity = polarity;
        self
    }

    pub fn content_size(mut self, size: u32) -> Self {
        self.config.content_size = size;
        self
    }

    pub fn canvas_size(mut self, size: u32) -> Self {
        self.config.canvas_size = size;
        self
    }

    pub fn max_skew_degrees(mut self, degrees: f64) -> Self {
        self.config.max_skew_degrees = degrees;
        self
    }

    pub fn close_strokes(mut self, enabled: bool) -> Self {
        self.config.close_strokes = enabled;
        self
    }

    pub fn deskew(mut self, enabled: bool) -> Self {
        self.config.deskew = enabled;
        self
    }

    pub fn resize_filter(mut self, filter: FilterType) -> Self {
        self.config.resize_filter = filter;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = PipelineConfig::builder()
            .polarity(InkPolarity::LightInk)
            .max_skew_degrees(15.0)
            .deskew(false)
            .resize_filter(FilterType::Nearest)
            .build();

        assert_eq!(config.polarity, InkPolarity::LightInk);
        assert_eq!(config.max_skew_degrees, 15.0);
        assert!(!config.deskew);
        assert!(config.close_strokes);
        assert_eq!(config.resize_filter, FilterType::Nearest);
        assert_eq!(config.canvas_size, 28);
        assert_eq!(config.content_size, 20);
    }

    #[test]
    fn test_validate_rejects_oversized_content() {
        let config = PipelineConfig::builder().content_size(40).build();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let config = PipelineConfig::builder().canvas_size(32).build();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let config = PipelineConfig::builder().max_skew_degrees(f64::NAN).build();
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "polarity": "light_ink", "resize_filter": "Nearest", "max_skew_degrees": 12.5 }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.polarity, InkPolarity::LightInk);
        assert_eq!(config.resize_filter, FilterType::Nearest);
        assert_eq!(config.max_skew_degrees, 12.5);
        assert_eq!(config.canvas_size, 28);
        assert!(config.deskew);
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(PipelineError::Json(_))
        ));
    }

    #[test]
    fn test_polarity_sentinels_are_opposite() {
        for polarity in [InkPolarity::DarkInk, InkPolarity::LightInk] {
            assert_ne!(polarity.foreground(), polarity.background());
            assert!(polarity.is_foreground(&polarity.foreground()));
            assert_eq!(polarity.ink_density(polarity.foreground()[0]), 1.0);
            assert_eq!(polarity.ink_density(polarity.background()[0]), 0.0);
        }
    }
}
