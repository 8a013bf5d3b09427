//! EXIF-driven rotation of captured photographs.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::DynamicImage;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// Clockwise rotation that brings the pixel rows upright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Upright,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Maps the EXIF orientation tag. Mirrored and unknown values count as upright.
    pub fn from_exif(tag: u32) -> Self {
        match tag {
            6 => Orientation::Rotate90,
            3 => Orientation::Rotate180,
            8 => Orientation::Rotate270,
            _ => Orientation::Upright,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Upright => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate180 => 180,
            Orientation::Rotate270 => 270,
        }
    }

    pub fn apply(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Orientation::Upright => image.clone(),
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }
}

/// Reads the orientation tag of the file at `path`. A file with EXIF data but
/// no orientation tag is upright; a file without readable EXIF data is an error.
pub fn read_orientation<P: AsRef<Path>>(path: P) -> Result<Orientation> {
    let file = File::open(path.as_ref())?;
    let exif = exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .map_err(|e| PipelineError::Metadata(e.to_string()))?;

    let tag = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1);
    Ok(Orientation::from_exif(tag))
}

/// Returns `image` rotated upright according to the metadata of `path`.
/// Unreadable metadata is logged and leaves the image unrotated.
pub fn correct_orientation<P: AsRef<Path>>(image: &DynamicImage, path: P) -> DynamicImage {
    let path = path.as_ref();
    let orientation = match read_orientation(path) {
        Ok(orientation) => orientation,
        Err(e) => {
            warn!("Orientation of {} unknown, assuming upright: {}", path.display(), e);
            Orientation::Upright
        }
    };

    if orientation == Orientation::Upright {
        info!("No rotation needed");
    } else {
        info!("Rotating image by {}°", orientation.degrees());
    }
    orientation.apply(image)
}
