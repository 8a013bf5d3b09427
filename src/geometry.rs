//! Bounding box, crop, moment-based deskew and resize-and-center.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::{debug, info};

use crate::config::InkPolarity;

/// Inclusive pixel bounds of the foreground.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// `None` when the raster holds no foreground pixel.
pub fn bounding_box(image: &GrayImage, polarity: InkPolarity) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if !polarity.is_foreground(pixel) {
            continue;
        }
        bbox = Some(match bbox {
            None => BoundingBox { min_x: x, min_y: y, max_x: x, max_y: y },
            Some(b) => BoundingBox {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bbox
}

/// Crops to the tightest box around the foreground; blank rasters are returned as-is.
pub fn crop_to_content(image: &GrayImage, polarity: InkPolarity) -> GrayImage {
    match bounding_box(image, polarity) {
        Some(b) => imageops::crop_imm(image, b.min_x, b.min_y, b.width(), b.height()).to_image(),
        None => {
            debug!("No foreground to crop to, keeping full raster");
            image.clone()
        }
    }
}

/// Skew angle in degrees from the second-order moments of the foreground:
/// `-atan2(Σ(x-cx)(y-cy), Σ(x-cx)²)`. Zero for an empty foreground or zero
/// horizontal variance.
pub fn skew_angle(image: &GrayImage, polarity: InkPolarity) -> f64 {
    let mut sum_x = 0f64;
    let mut sum_y = 0f64;
    let mut count = 0usize;
    for (x, y, pixel) in image.enumerate_pixels() {
        if polarity.is_foreground(pixel) {
            sum_x += x as f64;
            sum_y += y as f64;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }

    let cx = sum_x / count as f64;
    let cy = sum_y / count as f64;

    let mut cov_xy = 0f64;
    let mut cov_xx = 0f64;
    for (x, y, pixel) in image.enumerate_pixels() {
        if polarity.is_foreground(pixel) {
            let dx = x as f64 - cx;
            cov_xy += dx * (y as f64 - cy);
            cov_xx += dx * dx;
        }
    }

    if cov_xx == 0.0 {
        return 0.0;
    }
    let angle = -cov_xy.atan2(cov_xx).to_degrees();
    // normalise -0.0 so callers comparing against zero see a plain zero
    if angle == 0.0 {
        0.0
    } else {
        angle
    }
}

/// Rotates the raster clockwise by `angle` degrees about its centre, onto a
/// square background canvas large enough to hold every rotated pixel.
///
/// Angles whose magnitude reaches `max_degrees` are treated as measurement
/// noise and leave the raster untouched, as does a zero angle.
pub fn deskew(image: &GrayImage, angle: f64, max_degrees: f64, polarity: InkPolarity) -> GrayImage {
    if angle == 0.0 {
        return image.clone();
    }
    if angle.abs() >= max_degrees {
        info!(angle, max_degrees, "Skew angle beyond ceiling, deskew skipped");
        return image.clone();
    }

    let (w, h) = image.dimensions();
    let side = ((w as f64).hypot(h as f64).ceil() as u32).max(1);
    let mut padded = GrayImage::from_pixel(side, side, polarity.background());
    imageops::replace(
        &mut padded,
        image,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );

    info!(angle, "Deskewing");
    rotate_about_center(
        &padded,
        angle.to_radians() as f32,
        Interpolation::Nearest,
        polarity.background(),
    )
}

/// Scales the raster so its longer side equals `content_size` (aspect ratio
/// kept) and pastes it centred on a `canvas_size` square of background.
pub fn resize_and_center(
    image: &GrayImage,
    content_size: u32,
    canvas_size: u32,
    filter: FilterType,
    polarity: InkPolarity,
) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(canvas_size, canvas_size, polarity.background());
    if bounding_box(image, polarity).is_none() {
        debug!("Blank raster, emitting empty canvas");
        return canvas;
    }

    let (w, h) = image.dimensions();
    let longer = w.max(h).max(1) as f64;
    let scale = content_size as f64 / longer;
    let new_w = ((w as f64 * scale).round() as u32).clamp(1, content_size);
    let new_h = ((h as f64 * scale).round() as u32).clamp(1, content_size);

    let resized = imageops::resize(image, new_w, new_h, filter);

    let left = canvas_size.saturating_sub(new_w) / 2;
    let top = canvas_size.saturating_sub(new_h) / 2;
    imageops::replace(&mut canvas, &resized, left as i64, top as i64);
    debug!(new_w, new_h, left, top, "Digit scaled onto canvas");
    canvas
}
