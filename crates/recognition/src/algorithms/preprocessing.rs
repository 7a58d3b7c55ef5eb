use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use crate::{
    error::{RecognitionError, Result},
    traits::MaskStage,
};

/// Global binary threshold: values strictly above `threshold` become `max_value`
#[derive(Debug, Clone)]
pub struct BinaryThreshold {
    pub threshold: f64,
    pub max_value: u8,
}

impl Default for BinaryThreshold {
    fn default() -> Self {
        Self { threshold: 127.0, max_value: 255 }
    }
}

impl MaskStage for BinaryThreshold {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            pixel[0] = if pixel[0] as f64 > self.threshold { self.max_value } else { 0 };
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "threshold"
    }
}

/// Normalized box blur over a `size` x `size` neighborhood
#[derive(Debug, Clone)]
pub struct BoxBlur {
    pub size: u32,
}

impl Default for BoxBlur {
    fn default() -> Self {
        Self { size: 5 }
    }
}

impl MaskStage for BoxBlur {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.size == 0 || self.size % 2 == 0 {
            return Err(RecognitionError::InvalidParameter(format!(
                "blur size must be odd and positive, got {}",
                self.size
            )));
        }
        let radius = self.size / 2;
        Ok(imageproc::filter::box_filter(image, radius, radius))
    }

    fn name(&self) -> &'static str {
        "box_blur"
    }
}

/// Grayscale dilation (3x3 maximum), repeated `iterations` times
#[derive(Debug, Clone)]
pub struct Dilate {
    pub iterations: u32,
}

impl Default for Dilate {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl MaskStage for Dilate {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(repeat(image, self.iterations, |img| neighborhood_3x3(img, u8::max)))
    }

    fn name(&self) -> &'static str {
        "dilate"
    }
}

/// Grayscale erosion (3x3 minimum), repeated `iterations` times
#[derive(Debug, Clone)]
pub struct Erode {
    pub iterations: u32,
}

impl Default for Erode {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl MaskStage for Erode {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(repeat(image, self.iterations, |img| neighborhood_3x3(img, u8::min)))
    }

    fn name(&self) -> &'static str {
        "erode"
    }
}

/// Binary dilation with a square structuring element of side `2 * radius + 1`.
/// Any non-zero input counts as foreground; output is 0 or 255.
#[derive(Debug, Clone)]
pub struct SquareDilation {
    pub radius: u8,
}

impl Default for SquareDilation {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl MaskStage for SquareDilation {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::morphology::dilate(image, Norm::LInf, self.radius))
    }

    fn name(&self) -> &'static str {
        "square_dilation"
    }
}

/// Adaptive threshold against the box-filtered mean of a `block_size` x
/// `block_size` neighborhood (edge pixels replicated).
///
/// A pixel is foreground when `value - mean > -offset`, or with `inverted`
/// when `value - mean <= -offset`.
#[derive(Debug, Clone)]
pub struct AdaptiveMeanThreshold {
    pub block_size: u32,
    pub offset: i32,
    pub inverted: bool,
    pub max_value: u8,
}

impl Default for AdaptiveMeanThreshold {
    fn default() -> Self {
        Self {
            block_size: 3,
            offset: 2,
            inverted: true,
            max_value: 255,
        }
    }
}

impl MaskStage for AdaptiveMeanThreshold {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(RecognitionError::InvalidParameter(format!(
                "adaptive block size must be odd and at least 3, got {}",
                self.block_size
            )));
        }

        let radius = self.block_size / 2;
        let means = imageproc::filter::box_filter(image, radius, radius);
        let mut out = GrayImage::new(image.width(), image.height());

        for ((pixel, mean), target) in image.pixels().zip(means.pixels()).zip(out.pixels_mut()) {
            let diff = pixel[0] as i32 - mean[0] as i32;
            let foreground = (diff > -self.offset) != self.inverted;
            *target = Luma([if foreground { self.max_value } else { 0 }]);
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "adaptive_mean_threshold"
    }
}

/// Global histogram equalization
#[derive(Debug, Clone, Default)]
pub struct HistogramEqualization;

impl MaskStage for HistogramEqualization {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::equalize_histogram(image))
    }

    fn name(&self) -> &'static str {
        "equalize_histogram"
    }
}

fn repeat<F>(image: &GrayImage, iterations: u32, step: F) -> GrayImage
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let mut current = image.clone();
    for _ in 0..iterations {
        current = step(&current);
    }
    current
}

/// Fold `pick` over each pixel's in-bounds 3x3 neighborhood.
fn neighborhood_3x3(image: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = image.get_pixel(x, y)[0];
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    acc = pick(acc, image.get_pixel(nx, ny)[0]);
                }
            }
            out.put_pixel(x, y, Luma([acc]));
        }
    }
    out
}
