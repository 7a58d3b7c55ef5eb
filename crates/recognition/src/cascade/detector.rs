use std::sync::Arc;

use image::{GrayImage, imageops::FilterType};
use tracing::debug;

use super::{integral::IntegralImages, model::CascadeModel};
use crate::{
    error::{RecognitionError, Result},
    traits::ObjectDetector,
    types::Rectangle,
};

/// Multi-scale scanning parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    /// Ratio between consecutive scales; must be greater than 1
    pub scale_factor: f64,
    /// Smallest reported window `(width, height)`
    pub min_size: Option<(u32, u32)>,
    /// Largest reported window `(width, height)`
    pub max_size: Option<(u32, u32)>,
    /// Equalize the gray histogram before scanning
    pub equalize: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_size: None,
            max_size: None,
            equalize: false,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_factor > 1.0) || !self.scale_factor.is_finite() {
            return Err(RecognitionError::InvalidParameter(format!(
                "scale factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min.0 > max.0 || min.1 > max.1 {
                return Err(RecognitionError::InvalidParameter(format!(
                    "min size {min:?} exceeds max size {max:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Sliding-window cascade detector over an image pyramid.
///
/// Matches are reported raw: overlapping windows of the same object are not
/// merged here.
pub struct CascadeDetector {
    model: Arc<CascadeModel>,
    params: DetectorParams,
}

impl CascadeDetector {
    pub fn new(model: Arc<CascadeModel>, params: DetectorParams) -> Self {
        Self { model, params }
    }

    pub fn model(&self) -> &CascadeModel {
        &self.model
    }

    fn scan(&self, scaled: &GrayImage, factor: f64, bounds: (u32, u32), out: &mut Vec<Rectangle>) {
        let (window_width, window_height) = self.model.window();
        let integrals = IntegralImages::new(scaled, self.model.has_tilted());
        let step = if factor > 2.0 { 1 } else { 2 };
        let reported_width = (window_width as f64 * factor).round() as u32;
        let reported_height = (window_height as f64 * factor).round() as u32;

        let before = out.len();
        for y in (0..=scaled.height() - window_height).step_by(step) {
            for x in (0..=scaled.width() - window_width).step_by(step) {
                if self.model.classify(&integrals, x, y) {
                    let rect = Rectangle::new(
                        (x as f64 * factor).round() as u32,
                        (y as f64 * factor).round() as u32,
                        reported_width,
                        reported_height,
                    );
                    out.push(rect.clamp_to(bounds.0, bounds.1));
                }
            }
        }

        debug!(
            factor,
            width = scaled.width(),
            height = scaled.height(),
            step,
            matches = out.len() - before,
            "Scanned scale"
        );
    }
}

impl ObjectDetector for CascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<Rectangle>> {
        self.params.validate()?;

        let prepared;
        let gray = if self.params.equalize {
            prepared = imageproc::contrast::equalize_histogram(gray);
            &prepared
        } else {
            gray
        };

        let (width, height) = gray.dimensions();
        let (window_width, window_height) = self.model.window();
        let mut detections = Vec::new();
        let mut factor = 1.0f64;

        loop {
            let scaled_width = (width as f64 / factor).round() as u32;
            let scaled_height = (height as f64 / factor).round() as u32;
            if scaled_width < window_width || scaled_height < window_height {
                break;
            }

            let reported = (
                (window_width as f64 * factor).round() as u32,
                (window_height as f64 * factor).round() as u32,
            );
            if let Some(max) = self.params.max_size {
                if reported.0 > max.0 || reported.1 > max.1 {
                    break;
                }
            }
            let too_small = self
                .params
                .min_size
                .is_some_and(|min| reported.0 < min.0 || reported.1 < min.1);

            if !too_small {
                if scaled_width == width && scaled_height == height {
                    self.scan(gray, factor, (width, height), &mut detections);
                } else {
                    let scaled =
                        image::imageops::resize(gray, scaled_width, scaled_height, FilterType::Triangle);
                    self.scan(&scaled, factor, (width, height), &mut detections);
                }
            }

            factor *= self.params.scale_factor;
        }

        Ok(detections)
    }
}
