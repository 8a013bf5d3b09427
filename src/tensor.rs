use image::GrayImage;
use tract_onnx::prelude::{tract_ndarray, Tensor};

use crate::config::InkPolarity;
use crate::error::{PipelineError, Result};
use crate::{MODEL_PIXELS, MODEL_SIDE};

/// Row-major ink densities of a `MODEL_SIDE` x `MODEL_SIDE` raster, each in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedTensor {
    values: Vec<f32>,
}

impl EncodedTensor {
    pub fn from_image(image: &GrayImage, polarity: InkPolarity) -> Result<Self> {
        let (w, h) = image.dimensions();
        if w != MODEL_SIDE || h != MODEL_SIDE {
            return Err(PipelineError::InvalidDimensions(w, h));
        }
        // GrayImage pixels are stored row-major, top to bottom
        let values = image
            .pixels()
            .map(|p| polarity.ink_density(p[0]))
            .collect::<Vec<_>>();
        debug_assert_eq!(values.len(), MODEL_PIXELS);
        Ok(EncodedTensor { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Raw float buffer in the host's byte order.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    /// NHWC tensor of shape `[1, 28, 28, 1]`.
    pub fn to_tract(&self) -> Result<Tensor> {
        let side = MODEL_SIDE as usize;
        let arr = tract_ndarray::Array4::from_shape_vec((1, side, side, 1), self.values.clone())
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        Ok(arr.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_dark_ink_maps_black_to_one() {
        let mut img = GrayImage::from_pixel(28, 28, Luma([255]));
        img.put_pixel(3, 1, Luma([0]));
        img.put_pixel(0, 27, Luma([51]));

        let tensor = EncodedTensor::from_image(&img, InkPolarity::DarkInk).unwrap();
        assert_eq!(tensor.values().len(), 784);
        assert_eq!(tensor.values()[28 + 3], 1.0);
        assert!((tensor.values()[27 * 28] - 0.8).abs() < 1e-6);
        assert_eq!(tensor.values()[0], 0.0);
    }

    #[test]
    fn test_light_ink_maps_white_to_one() {
        let mut img = GrayImage::from_pixel(28, 28, Luma([0]));
        img.put_pixel(27, 0, Luma([255]));
        let tensor = EncodedTensor::from_image(&img, InkPolarity::LightInk).unwrap();
        assert_eq!(tensor.values()[27], 1.0);
        assert!(tensor.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rejects_wrong_size() {
        let img = GrayImage::new(20, 28);
        assert!(matches!(
            EncodedTensor::from_image(&img, InkPolarity::DarkInk),
            Err(PipelineError::InvalidDimensions(20, 28))
        ));
    }

    #[test]
    fn test_native_byte_layout() {
        let mut img = GrayImage::from_pixel(28, 28, Luma([255]));
        img.put_pixel(1, 0, Luma([0]));
        let tensor = EncodedTensor::from_image(&img, InkPolarity::DarkInk).unwrap();
        let bytes = tensor.to_ne_bytes();
        assert_eq!(bytes.len(), 4 * 784);
        assert_eq!(&bytes[4..8], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_tract_shape() {
        let img = GrayImage::from_pixel(28, 28, Luma([255]));
        let tensor = EncodedTensor::from_image(&img, InkPolarity::DarkInk)
            .unwrap()
            .to_tract()
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 28, 28, 1]);
    }
}
