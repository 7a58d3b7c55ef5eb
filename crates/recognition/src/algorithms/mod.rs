pub mod preprocessing;
pub mod extraction;
pub mod grouping;

pub use preprocessing::*;
pub use extraction::*;
pub use grouping::*;

use image::GrayImage;
use crate::{
    error::Result,
    traits::{ContourExtractor, MaskStage},
    types::{ContourPointSet, Rectangle},
};

/// Mask stages followed by contour extraction, reduced to one bounding box
#[derive(Debug)]
pub struct BoundingBoxExtractor<P, C>
where
    P: MaskStage,
    C: ContourExtractor,
{
    pub preprocessor: P,
    pub contour_extractor: C,
}

impl<P, C> BoundingBoxExtractor<P, C>
where
    P: MaskStage,
    C: ContourExtractor,
{
    pub fn new(preprocessor: P, contour_extractor: C) -> Self {
        Self {
            preprocessor,
            contour_extractor,
        }
    }

    /// Bounding rectangle of every contour point; degenerate when the mask is empty
    pub fn extract(&self, image: &GrayImage) -> Result<Rectangle> {
        let mask = self.preprocessor.apply(image)?;
        let contours = self.contour_extractor.extract_contours(&mask)?;
        Ok(ContourPointSet::merge(contours).bounding_rect())
    }
}
