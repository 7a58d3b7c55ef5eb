use tracing::{debug, warn};

use crate::{
    algorithms::{BoundingBoxExtractor, ImageprocContourExtractor},
    error::Result,
    pipeline::{MaskPipeline, builder::MaskPipelineBuilder},
    raster::{Plane, RasterBuffer},
    types::Rectangle,
};

/// Finds one enclosing box around everything that stands out on a chroma
/// plane of the LAB image.
#[derive(Debug, Clone)]
pub struct ContourBoundingBoxSegmenter {
    pub plane: Plane,
    pub block_size: u32,
    pub offset: i32,
    pub dilate_radius: u8,
}

impl Default for ContourBoundingBoxSegmenter {
    fn default() -> Self {
        Self {
            plane: Plane::BlueYellow,
            block_size: 3,
            offset: 2,
            dilate_radius: 1,
        }
    }
}

impl ContourBoundingBoxSegmenter {
    fn extractor(&self) -> BoundingBoxExtractor<MaskPipeline, ImageprocContourExtractor> {
        let pipeline = MaskPipelineBuilder::build_chroma_mask(self.block_size, self.offset, self.dilate_radius);
        BoundingBoxExtractor::new(pipeline, ImageprocContourExtractor::default())
    }

    /// Degenerate `(0, 0, 0, 0)` when nothing stands out
    pub fn bounding_box(&self, source: &RasterBuffer) -> Result<Rectangle> {
        let chroma = source.to_lab()?.plane(self.plane)?;
        let rect = self.extractor().extract(&chroma)?;
        if rect.is_degenerate() {
            warn!("No contours found, reporting an empty bounding box");
        } else {
            debug!(?rect, "Computed foreground bounding box");
        }
        Ok(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn square_on(object: [u8; 3], background: [u8; 3]) -> RasterBuffer {
        let img = RgbImage::from_fn(200, 150, |x, y| {
            if (60..120).contains(&x) && (40..100).contains(&y) {
                Rgb(object)
            } else {
                Rgb(background)
            }
        });
        RasterBuffer::from_rgb_image(img)
    }

    fn blue_on_white() -> RasterBuffer {
        square_on([0, 0, 200], [250, 250, 250])
    }

    #[test]
    fn blue_object_is_boxed() {
        let rect = ContourBoundingBoxSegmenter::default().bounding_box(&blue_on_white()).unwrap();
        assert_eq!(rect, Rectangle::new(59, 39, 62, 62));
    }

    #[test]
    fn low_chroma_dark_objects_are_boxed() {
        let segmenter = ContourBoundingBoxSegmenter::default();
        let bluish = segmenter.bounding_box(&square_on([40, 40, 50], [245, 245, 245])).unwrap();
        assert_eq!(bluish, Rectangle::new(59, 39, 62, 62));
        let brown = segmenter.bounding_box(&square_on([60, 40, 20], [245, 245, 245])).unwrap();
        assert_eq!(brown, Rectangle::new(58, 38, 64, 64));
    }

    #[test]
    fn neutral_dark_objects_vanish_on_the_blue_yellow_plane() {
        // Gray and black share the background's chroma, so nothing stands out.
        let segmenter = ContourBoundingBoxSegmenter::default();
        for object in [[0, 0, 0], [30, 30, 30]] {
            let rect = segmenter.bounding_box(&square_on(object, [245, 245, 245])).unwrap();
            assert_eq!(rect, Rectangle::degenerate(), "object {object:?}");
        }
    }

    #[test]
    fn dilation_radius_is_configurable() {
        let segmenter = ContourBoundingBoxSegmenter {
            dilate_radius: 0,
            ..Default::default()
        };
        assert_eq!(segmenter.bounding_box(&blue_on_white()).unwrap(), Rectangle::new(60, 40, 60, 60));
    }

    #[test]
    fn uniform_image_gives_degenerate_box() {
        let source = RasterBuffer::from_rgb_image(RgbImage::from_pixel(50, 40, Rgb([250, 250, 250])));
        let rect = ContourBoundingBoxSegmenter::default().bounding_box(&source).unwrap();
        assert_eq!(rect, Rectangle::degenerate());
    }

    #[test]
    fn non_lab_plane_is_rejected() {
        let segmenter = ContourBoundingBoxSegmenter {
            plane: Plane::Hue,
            ..Default::default()
        };
        assert!(segmenter.bounding_box(&blue_on_white()).is_err());
    }
}
