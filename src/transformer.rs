use enum_dispatch::enum_dispatch;
use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binarize::{grayscale, otsu_binarize};
use crate::components::keep_largest_component;
use crate::config::{FilterOption, InkPolarity};
use crate::error::{PipelineError, Result};
use crate::geometry::{crop_to_content, deskew, resize_and_center, skew_angle};
use crate::morphology::close;

/// One pipeline step, serialisable so a stage list can be stored as configuration.
#[enum_dispatch]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ImageTransform {
    Grayscale(Grayscale),
    OtsuBinarize(OtsuBinarize),
    KeepLargestComponent(KeepLargestComponent),
    CropToContent(CropToContent),
    MorphClose(MorphClose),
    Deskew(Deskew),
    ResizeCenter(ResizeCenter),
}

#[enum_dispatch(ImageTransform)]
pub trait GenericTransform {
    fn name(&self) -> &'static str;
    fn transform(&self, input: StageImage) -> Result<StageImage>;
}

/// Raster handed from one stage to the next.
#[derive(Clone, Debug, PartialEq)]
pub enum StageImage {
    Color(RgbImage),
    Gray(GrayImage),
}

impl StageImage {
    pub fn kind(&self) -> &'static str {
        match self {
            StageImage::Color(_) => "colour",
            StageImage::Gray(_) => "grayscale",
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            StageImage::Color(image) => image.dimensions(),
            StageImage::Gray(image) => image.dimensions(),
        }
    }

    fn into_gray(self, stage: &'static str) -> Result<GrayImage> {
        match self {
            StageImage::Gray(image) => Ok(image),
            other => Err(PipelineError::UnexpectedInput {
                stage,
                found: other.kind(),
            }),
        }
    }
}

impl From<RgbImage> for StageImage {
    fn from(image: RgbImage) -> Self {
        StageImage::Color(image)
    }
}

impl From<GrayImage> for StageImage {
    fn from(image: GrayImage) -> Self {
        StageImage::Gray(image)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Grayscale {}

impl GenericTransform for Grayscale {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        match input {
            StageImage::Color(image) => Ok(grayscale(&image).into()),
            // already single-channel
            StageImage::Gray(image) => Ok(image.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtsuBinarize {
    pub polarity: InkPolarity,
}

impl GenericTransform for OtsuBinarize {
    fn name(&self) -> &'static str {
        "otsu_binarize"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        let (binary, threshold) = otsu_binarize(&image, self.polarity);
        info!("Threshold chosen: {}", threshold);
        Ok(binary.into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeepLargestComponent {
    pub polarity: InkPolarity,
}

impl GenericTransform for KeepLargestComponent {
    fn name(&self) -> &'static str {
        "keep_largest_component"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        Ok(keep_largest_component(&image, self.polarity).into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropToContent {
    pub polarity: InkPolarity,
}

impl GenericTransform for CropToContent {
    fn name(&self) -> &'static str {
        "crop_to_content"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        Ok(crop_to_content(&image, self.polarity).into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MorphClose {
    pub polarity: InkPolarity,
}

impl GenericTransform for MorphClose {
    fn name(&self) -> &'static str {
        "morph_close"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        Ok(close(&image, self.polarity).into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deskew {
    pub polarity: InkPolarity,
    pub max_degrees: f64,
}

impl GenericTransform for Deskew {
    fn name(&self) -> &'static str {
        "deskew"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        let angle = skew_angle(&image, self.polarity);
        info!("Skew angle: {:.2}°", angle);
        Ok(deskew(&image, angle, self.max_degrees, self.polarity).into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResizeCenter {
    pub polarity: InkPolarity,
    pub content_size: u32,
    pub canvas_size: u32,
    #[serde(with = "FilterOption")]
    pub filter: FilterType,
}

impl GenericTransform for ResizeCenter {
    fn name(&self) -> &'static str {
        "resize_center"
    }

    fn transform(&self, input: StageImage) -> Result<StageImage> {
        let image = input.into_gray(self.name())?;
        debug!("Resizing {:?} onto {}px canvas", image.dimensions(), self.canvas_size);
        Ok(resize_and_center(
            &image,
            self.content_size,
            self.canvas_size,
            self.filter,
            self.polarity,
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_gray_stage_rejects_colour_input() {
        let stage: ImageTransform = MorphClose {
            polarity: InkPolarity::DarkInk,
        }
        .into();
        let err = stage
            .transform(RgbImage::new(4, 4).into())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnexpectedInput {
                stage: "morph_close",
                found: "colour"
            }
        ));
    }

    #[test]
    fn test_grayscale_passes_gray_through() {
        let gray = GrayImage::from_pixel(3, 3, Luma([7]));
        let out = Grayscale {}.transform(gray.clone().into()).unwrap();
        assert_eq!(out, StageImage::Gray(gray));

        let colour = RgbImage::from_pixel(2, 2, Rgb([30, 60, 90]));
        let out = Grayscale {}.transform(colour.into()).unwrap();
        assert_eq!(out, StageImage::Gray(GrayImage::from_pixel(2, 2, Luma([60]))));
    }

    #[test]
    fn test_stage_list_round_trips_through_json() {
        let stages: Vec<ImageTransform> = vec![
            Grayscale {}.into(),
            OtsuBinarize {
                polarity: InkPolarity::LightInk,
            }
            .into(),
            ResizeCenter {
                polarity: InkPolarity::LightInk,
                content_size: 20,
                canvas_size: 28,
                filter: FilterType::Nearest,
            }
            .into(),
        ];
        let json = serde_json::to_string(&stages).unwrap();
        assert!(json.contains(r#""stage":"otsu_binarize""#));

        let parsed: Vec<ImageTransform> = serde_json::from_str(&json).unwrap();
        let names: Vec<_> = parsed.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["grayscale", "otsu_binarize", "resize_center"]);
    }
}
