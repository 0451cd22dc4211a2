//! Downscaling to a bounding box.

use image::{DynamicImage, GenericImageView};

use super::TransformAction;
use crate::error::TransformError;

/// Shrinks an image so its longest edge is at most `max_dimension`,
/// preserving aspect ratio. Images already within bounds are copied as-is.
#[derive(Debug, Clone, Copy)]
pub struct FitAction {
    max_dimension: u32,
}

impl FitAction {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl TransformAction for FitAction {
    fn name(&self) -> &str {
        "fit"
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
        if self.max_dimension == 0 {
            return Err(TransformError::new(self.name(), "max dimension must be > 0"));
        }
        let (width, height) = image.dimensions();
        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(image.clone());
        }
        Ok(image.thumbnail(self.max_dimension, self.max_dimension))
    }
}
