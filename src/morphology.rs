//! Single-pass morphological closing with a 2x2 structuring element.

use image::GrayImage;

use crate::config::InkPolarity;

/// Dilation: a pixel becomes foreground when any pixel of the 2x2 block ending
/// at it (`x-1..=x`, `y-1..=y`) is foreground. Pixels outside the raster count
/// as background.
pub fn dilate(image: &GrayImage, polarity: InkPolarity) -> GrayImage {
    let (w, h) = image.dimensions();
    let (fg, bg) = (polarity.foreground(), polarity.background());
    GrayImage::from_fn(w, h, |x, y| {
        let hit = (y.saturating_sub(1)..=y).any(|ny| {
            (x.saturating_sub(1)..=x).any(|nx| polarity.is_foreground(image.get_pixel(nx, ny)))
        });
        if hit {
            fg
        } else {
            bg
        }
    })
}

/// Erosion: a pixel stays foreground only when the whole 2x2 block starting at
/// it (`x..=x+1`, `y..=y+1`) is foreground. Pixels outside the raster count as
/// foreground so content touching the right or bottom edge is not eaten.
pub fn erode(image: &GrayImage, polarity: InkPolarity) -> GrayImage {
    let (w, h) = image.dimensions();
    let (fg, bg) = (polarity.foreground(), polarity.background());
    GrayImage::from_fn(w, h, |x, y| {
        let solid = (y..=y + 1).all(|ny| {
            (x..=x + 1)
                .all(|nx| nx >= w || ny >= h || polarity.is_foreground(image.get_pixel(nx, ny)))
        });
        if solid {
            fg
        } else {
            bg
        }
    })
}

/// Dilation followed by erosion. The result always contains the input's
/// foreground and bridges gaps one pixel wide.
pub fn close(image: &GrayImage, polarity: InkPolarity) -> GrayImage {
    erode(&dilate(image, polarity), polarity)
}
