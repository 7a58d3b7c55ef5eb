use image::GrayImage;
use tracing::{debug, warn};

use crate::{
    error::Result,
    pipeline::{MaskPipeline, builder::MaskPipelineBuilder},
    raster::{Plane, RasterBuffer},
    types::HueHistogram,
};

const WHITE: [u8; 3] = [255, 255, 255];

/// Hue mask together with the threshold it was cut at
#[derive(Debug, Clone)]
pub struct HueMask {
    pub average_hue: f64,
    pub mask: GrayImage,
}

impl HueMask {
    pub fn foreground_pixels(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] != 0).count()
    }
}

/// Separates pixels whose hue lies above the image's average hue and paints
/// everything else white.
#[derive(Debug, Clone)]
pub struct HueBackgroundSegmenter {
    pub blur_size: u32,
    pub dilate_iterations: u32,
    pub erode_iterations: u32,
}

impl Default for HueBackgroundSegmenter {
    fn default() -> Self {
        Self {
            blur_size: 5,
            dilate_iterations: 1,
            erode_iterations: 3,
        }
    }
}

impl HueBackgroundSegmenter {
    fn pipeline(&self, average_hue: f64) -> MaskPipeline {
        MaskPipelineBuilder::build_hue_mask(
            average_hue,
            self.blur_size,
            self.dilate_iterations,
            self.erode_iterations,
        )
    }

    pub fn foreground_mask(&self, source: &RasterBuffer) -> Result<HueMask> {
        let hue = source.to_hsv()?.plane(Plane::Hue)?;
        let average_hue = HueHistogram::from_plane(&hue).average();
        let mask = self.pipeline(average_hue).process(&hue)?;
        Ok(HueMask { average_hue, mask })
    }

    /// New buffer with the source kept under the mask and white elsewhere
    pub fn segment(&self, source: &RasterBuffer) -> Result<RasterBuffer> {
        let hue_mask = self.foreground_mask(source)?;
        let kept = hue_mask.foreground_pixels();
        if kept == 0 {
            warn!(average_hue = hue_mask.average_hue, "Hue mask is empty, output is blank");
        } else {
            debug!(average_hue = hue_mask.average_hue, kept, "Computed hue mask");
        }
        source.composite_onto(&hue_mask.mask, &WHITE)
    }
}
