use std::path::Path;

use image::{DynamicImage, GrayImage};
use tracing::{debug, instrument};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::orientation::correct_orientation;
use crate::tensor::EncodedTensor;
use crate::transformer::{
    CropToContent, Deskew, GenericTransform, Grayscale, ImageTransform, KeepLargestComponent,
    MorphClose, OtsuBinarize, ResizeCenter, StageImage,
};

/// Normalised digit ready for the classifier.
#[derive(Clone, Debug)]
pub struct ProcessedDigit {
    pub image: GrayImage,
    pub tensor: EncodedTensor,
}

/// Ordered preprocessing stages turning a photograph into a model input.
///
/// Holds no mutable state; one instance can serve any number of threads.
pub struct DigitPipeline {
    steps: Vec<ImageTransform>,
    config: PipelineConfig,
}

impl DigitPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let polarity = config.polarity;

        let mut steps: Vec<ImageTransform> = vec![
            Grayscale {}.into(),
            OtsuBinarize { polarity }.into(),
            KeepLargestComponent { polarity }.into(),
            CropToContent { polarity }.into(),
        ];
        if config.close_strokes {
            steps.push(MorphClose { polarity }.into());
        }
        if config.deskew {
            steps.push(
                Deskew {
                    polarity,
                    max_degrees: config.max_skew_degrees,
                }
                .into(),
            );
            // drop the padding added by rotation before scaling
            steps.push(CropToContent { polarity }.into());
        }
        steps.push(
            ResizeCenter {
                polarity,
                content_size: config.content_size,
                canvas_size: config.canvas_size,
                filter: config.resize_filter,
            }
            .into(),
        );

        Ok(Self { steps, config })
    }

    /// Uses a caller-supplied stage list instead of the one derived from `config`.
    pub fn with_steps(steps: Vec<ImageTransform>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { steps, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn steps(&self) -> &[ImageTransform] {
        &self.steps
    }

    /// Runs every stage in order and returns the final single-channel raster.
    pub fn transform_image(&self, image: &DynamicImage) -> Result<GrayImage> {
        let mut result = StageImage::Color(image.to_rgb8());

        for step in &self.steps {
            result = step.transform(result)?;
            debug!("{} -> {:?}", step.name(), result.dimensions());
        }

        match result {
            StageImage::Gray(image) => Ok(image),
            other => Err(PipelineError::UnexpectedInput {
                stage: "encode",
                found: other.kind(),
            }),
        }
    }

    /// Preprocesses an already upright image.
    pub fn process(&self, image: &DynamicImage) -> Result<ProcessedDigit> {
        let image = self.transform_image(image)?;
        let tensor = EncodedTensor::from_image(&image, self.config.polarity)?;
        Ok(ProcessedDigit { image, tensor })
    }

    /// Corrects orientation from the metadata of `source`, then preprocesses.
    #[instrument(skip_all, fields(source = %source.as_ref().display()))]
    pub fn process_photo<P: AsRef<Path>>(
        &self,
        image: &DynamicImage,
        source: P,
    ) -> Result<ProcessedDigit> {
        let upright = correct_orientation(image, source.as_ref());
        self.process(&upright)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::foreground_count;
    use crate::config::InkPolarity;
    use crate::geometry::bounding_box;
    use image::{Rgb, RgbImage};

    fn photo_with_stroke(x0: u32, y0: u32, w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(120, 90, Rgb([235, 230, 220]));
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgb([20, 25, 30]));
            }
        }
        // a speck of dirt that should be filtered out
        img.put_pixel(3, 3, Rgb([10, 10, 10]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_default_stage_order() {
        let pipeline = DigitPipeline::new(PipelineConfig::default()).unwrap();
        let names: Vec<_> = pipeline.steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "grayscale",
                "otsu_binarize",
                "keep_largest_component",
                "crop_to_content",
                "morph_close",
                "deskew",
                "crop_to_content",
                "resize_center",
            ]
        );
    }

    #[test]
    fn test_optional_stages_can_be_disabled() {
        let config = PipelineConfig::builder()
            .close_strokes(false)
            .deskew(false)
            .build();
        let pipeline = DigitPipeline::new(config).unwrap();
        assert_eq!(pipeline.steps().len(), 5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig::builder().canvas_size(0).build();
        assert!(matches!(
            DigitPipeline::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_canvas_other_than_model_side_is_rejected() {
        let config = PipelineConfig::builder().canvas_size(32).build();
        assert!(matches!(
            DigitPipeline::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_upright_bar_is_centered_at_content_size() {
        let config = PipelineConfig::builder()
            .resize_filter(image::imageops::FilterType::Nearest)
            .build();
        let pipeline = DigitPipeline::new(config).unwrap();
        let digit = pipeline.process(&photo_with_stroke(50, 20, 8, 40)).unwrap();

        assert_eq!(digit.image.dimensions(), (28, 28));
        let bbox = bounding_box(&digit.image, InkPolarity::DarkInk).unwrap();
        assert_eq!(bbox.height(), 20);
        assert_eq!(bbox.width(), 4);
        assert!(bbox.min_x.abs_diff(27 - bbox.max_x) <= 1);
        assert_eq!(foreground_count(&digit.image, InkPolarity::DarkInk), 80);
        assert!(digit.tensor.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_custom_steps_must_end_single_channel() {
        let pipeline = DigitPipeline::with_steps(Vec::new(), PipelineConfig::default()).unwrap();
        let err = pipeline
            .process(&photo_with_stroke(10, 10, 5, 5))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedInput { stage: "encode", .. }));
    }
}
