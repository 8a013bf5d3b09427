//! Grayscale conversion and global Otsu binarization.

use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::config::InkPolarity;

/// Per-pixel mean of the three colour channels.
pub fn grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([((r as u16 + g as u16 + b as u16) / 3) as u8])
    })
}

/// Intensity counts of a grayscale raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram([u32; 256]);

impl Histogram {
    pub fn from_gray(image: &GrayImage) -> Self {
        let mut buckets = [0u32; 256];
        for pixel in image.pixels() {
            buckets[pixel[0] as usize] += 1;
        }
        Histogram(buckets)
    }

    pub fn from_counts(buckets: [u32; 256]) -> Self {
        Histogram(buckets)
    }

    pub fn counts(&self) -> &[u32; 256] {
        &self.0
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| c as u64).sum()
    }

    /// Otsu's threshold: the `t` maximising `n_below * n_above * (mean_below - mean_above)^2`,
    /// where the lower class is `0..=t`. Thresholds leaving a class empty are skipped and only
    /// a strictly greater variance replaces the incumbent, so ties keep the smallest `t`.
    /// Returns 0 when no threshold splits the histogram.
    pub fn otsu_threshold(&self) -> u8 {
        let total = self.total();
        let weighted_total: f64 = self
            .0
            .iter()
            .enumerate()
            .map(|(value, &count)| value as f64 * count as f64)
            .sum();

        let mut count_below = 0u64;
        let mut sum_below = 0f64;
        let mut best_variance = 0f64;
        let mut threshold = 0u8;

        for t in 0..=255usize {
            count_below += self.0[t] as u64;
            sum_below += t as f64 * self.0[t] as f64;

            let count_above = total - count_below;
            if count_below == 0 || count_above == 0 {
                continue;
            }

            let mean_below = sum_below / count_below as f64;
            let mean_above = (weighted_total - sum_below) / count_above as f64;
            let diff = mean_below - mean_above;
            let variance = count_below as f64 * count_above as f64 * diff * diff;

            if variance > best_variance {
                best_variance = variance;
                threshold = t as u8;
            }
        }

        threshold
    }
}

/// Maps every pixel onto one of the two sentinel colours of `polarity`.
pub fn binarize(image: &GrayImage, threshold: u8, polarity: InkPolarity) -> GrayImage {
    let (fg, bg) = (polarity.foreground(), polarity.background());
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let value = if polarity.is_ink(pixel[0], threshold) { fg } else { bg };
        out.put_pixel(x, y, value);
    }
    out
}

/// Histogram, threshold selection and binarization in one pass over the caller's raster.
pub fn otsu_binarize(image: &GrayImage, polarity: InkPolarity) -> (GrayImage, u8) {
    let threshold = Histogram::from_gray(image).otsu_threshold();
    debug!(threshold, ?polarity, "Otsu threshold selected");
    (binarize(image, threshold, polarity), threshold)
}
