use image::GrayImage;
use crate::{error::Result, types::{ContourPointSet, Rectangle}};

/// Trait for single-plane mask operations (threshold, blur, morphology)
pub trait MaskStage: Send + Sync {
    /// Transform the input plane into a new plane of the same size
    fn apply(&self, image: &GrayImage) -> Result<GrayImage>;

    /// Short label used in pipeline descriptions and logs
    fn name(&self) -> &'static str;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract every boundary of every foreground region of a binary mask
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<ContourPointSet>>;
}

/// Trait for detectors that locate pattern instances in a grayscale image
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<Rectangle>>;
}

/// Trait for optional post-processing of raw detections
pub trait DetectionPostProcessor: Send + Sync {
    fn process(&self, detections: Vec<Rectangle>) -> Result<Vec<Rectangle>>;
}
