//! Image conversion utilities between the `image` crate and tracker frames.

use crate::app::FrameSource;
use crate::frame::{GrayFrame, RgbaFrame};
use crate::{Error, Result};
use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};

/// Image file extensions picked up by [`ImageSequenceSource`]
const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Convert an `image` RGBA buffer into a tracker frame
///
/// # Errors
/// * Returns error if the buffer does not match its dimensions
pub fn rgba_image_to_frame(image: RgbaImage) -> Result<RgbaFrame> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    RgbaFrame::new(width, height, image.into_raw())
}

/// Convert a grayscale frame into an `image` buffer (for debug output)
///
/// # Errors
/// * Returns error if the frame dimensions exceed `u32`
pub fn gray_frame_to_image(frame: &GrayFrame) -> Result<GrayImage> {
    let width = u32::try_from(frame.width())
        .map_err(|_| Error::InvalidInput(format!("Frame width {} too large", frame.width())))?;
    let height = u32::try_from(frame.height())
        .map_err(|_| Error::InvalidInput(format!("Frame height {} too large", frame.height())))?;
    GrayImage::from_raw(width, height, frame.data().to_vec())
        .ok_or_else(|| Error::InvalidInput(format!("Gray buffer does not match {width}x{height}")))
}

/// Decode an image file into an RGBA frame
///
/// # Errors
/// * Returns error if the file cannot be read or decoded
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<RgbaFrame> {
    let image = image::open(path.as_ref())?.to_rgba8();
    rgba_image_to_frame(image)
}

/// Frames read from the image files of a directory, in file name order
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    /// Collect the PNG and JPEG files of `dir`
    ///
    /// # Errors
    /// * Returns error if the directory cannot be read or holds no images
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if is_frame {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(Error::InvalidInput(format!("No image files in {}", dir.display())));
        }
        paths.sort();
        log::info!("Found {} frames in {}", paths.len(), dir.display());
        Ok(Self { paths, next: 0 })
    }

    /// Number of frames in the sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbaFrame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        log::debug!("Loading frame {}", path.display());
        load_frame(path).map(Some)
    }
}
