//! Largest 4-connected foreground component.

use image::GrayImage;
use tracing::debug;

use crate::config::InkPolarity;

const UNLABELLED: u32 = 0;

/// Keeps only the largest 4-connected foreground component; every other
/// foreground pixel is recoloured to background.
///
/// Components are labelled in raster order with an explicit stack, so large
/// photographs cannot exhaust the call stack. On equal sizes the component
/// reached first in the scan wins.
pub fn keep_largest_component(image: &GrayImage, polarity: InkPolarity) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut labels = vec![UNLABELLED; w * h];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    let mut next_label = 1u32;
    let mut best_label = UNLABELLED;
    let mut best_size = 0usize;
    let mut components = 0usize;

    for y in 0..h {
        for x in 0..w {
            if labels[y * w + x] != UNLABELLED
                || !polarity.is_foreground(image.get_pixel(x as u32, y as u32))
            {
                continue;
            }

            let label = next_label;
            next_label += 1;
            components += 1;

            let mut size = 0usize;
            labels[y * w + x] = label;
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                size += 1;
                let neighbours = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbours {
                    // wrapping_sub turns -1 into usize::MAX, which the bounds check rejects
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let idx = ny * w + nx;
                    if labels[idx] == UNLABELLED
                        && polarity.is_foreground(image.get_pixel(nx as u32, ny as u32))
                    {
                        labels[idx] = label;
                        stack.push((nx, ny));
                    }
                }
            }

            if size > best_size {
                best_size = size;
                best_label = label;
            }
        }
    }

    debug!(components, kept = best_size, "Connected components labelled");

    let background = polarity.background();
    let mut out = image.clone();
    for (i, &label) in labels.iter().enumerate() {
        if label != UNLABELLED && label != best_label {
            out.put_pixel((i % w) as u32, (i / w) as u32, background);
        }
    }
    out
}

/// Number of foreground pixels in a binarized raster.
pub fn foreground_count(image: &GrayImage, polarity: InkPolarity) -> usize {
    image.pixels().filter(|p| polarity.is_foreground(p)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(polarity: InkPolarity, w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, polarity.background())
    }

    fn fill(img: &mut GrayImage, polarity: InkPolarity, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, polarity.foreground());
            }
        }
    }

    #[test]
    fn test_keeps_only_larger_blob() {
        let polarity = InkPolarity::DarkInk;
        let mut img = canvas(polarity, 30, 20);
        // 2x5 speck first in scan order, then the 10x5 blob
        fill(&mut img, polarity, 1, 1, 2, 5);
        fill(&mut img, polarity, 10, 8, 10, 5);

        let out = keep_largest_component(&img, polarity);
        assert_eq!(foreground_count(&out, polarity), 50);
        assert!(polarity.is_foreground(out.get_pixel(10, 8)));
        assert!(!polarity.is_foreground(out.get_pixel(1, 1)));
    }

    #[test]
    fn test_diagonal_pixels_are_separate_components() {
        let polarity = InkPolarity::LightInk;
        let mut img = canvas(polarity, 4, 4);
        fill(&mut img, polarity, 0, 0, 1, 1);
        fill(&mut img, polarity, 1, 1, 1, 1);

        let out = keep_largest_component(&img, polarity);
        assert_eq!(foreground_count(&out, polarity), 1);
        // tie: the first component in scan order survives
        assert!(polarity.is_foreground(out.get_pixel(0, 0)));
        assert!(!polarity.is_foreground(out.get_pixel(1, 1)));
    }

    #[test]
    fn test_all_background_is_unchanged() {
        let polarity = InkPolarity::DarkInk;
        let img = canvas(polarity, 12, 9);
        let out = keep_largest_component(&img, polarity);
        assert_eq!(out, img);
    }

    #[test]
    fn test_large_single_component_does_not_overflow() {
        let polarity = InkPolarity::DarkInk;
        let mut img = canvas(polarity, 600, 600);
        fill(&mut img, polarity, 0, 0, 600, 600);
        let out = keep_largest_component(&img, polarity);
        assert_eq!(foreground_count(&out, polarity), 360_000);
    }
}
