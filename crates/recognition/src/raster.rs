//! Decoded pixel storage tagged with its color-plane interpretation.
//!
//! A [`RasterBuffer`] never reinterprets its bytes in place: every color-space
//! conversion allocates a new buffer with a new [`PlaneLayout`] tag. Conversions
//! follow the 8-bit conventions used by common vision libraries, so thresholds
//! tuned there (hue in `[0, 179]`, LAB chroma offset by 128) carry over.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};

/// How the bytes of a [`RasterBuffer`] are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaneLayout {
    /// Interleaved red, green, blue.
    Rgb,
    /// Interleaved hue `[0, 179]`, saturation, value.
    Hsv,
    /// Interleaved lightness, green–red chroma, blue–yellow chroma.
    Lab,
    /// A single plane: grayscale intensity or a binary mask.
    Gray,
}

impl PlaneLayout {
    pub fn channels(self) -> usize {
        match self {
            PlaneLayout::Rgb | PlaneLayout::Hsv | PlaneLayout::Lab => 3,
            PlaneLayout::Gray => 1,
        }
    }
}

/// A named plane of some layout.
///
/// Planes are addressed by meaning rather than by position so callers never
/// depend on a particular channel ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plane {
    Red,
    Green,
    Blue,
    Hue,
    Saturation,
    Value,
    Lightness,
    /// LAB `a`: negative towards green, positive towards red.
    GreenRed,
    /// LAB `b`: negative towards blue, positive towards yellow.
    BlueYellow,
    Intensity,
}

impl Plane {
    fn locate(self) -> (PlaneLayout, usize) {
        match self {
            Plane::Red => (PlaneLayout::Rgb, 0),
            Plane::Green => (PlaneLayout::Rgb, 1),
            Plane::Blue => (PlaneLayout::Rgb, 2),
            Plane::Hue => (PlaneLayout::Hsv, 0),
            Plane::Saturation => (PlaneLayout::Hsv, 1),
            Plane::Value => (PlaneLayout::Hsv, 2),
            Plane::Lightness => (PlaneLayout::Lab, 0),
            Plane::GreenRed => (PlaneLayout::Lab, 1),
            Plane::BlueYellow => (PlaneLayout::Lab, 2),
            Plane::Intensity => (PlaneLayout::Gray, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    layout: PlaneLayout,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap raw interleaved bytes, checking that the length matches the shape.
    pub fn new(width: u32, height: u32, layout: PlaneLayout, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(RecognitionError::InvalidBuffer(format!(
                "{width}x{height} {layout:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// A buffer of one repeated pixel.
    pub fn filled(width: u32, height: u32, layout: PlaneLayout, pixel: &[u8]) -> Result<Self> {
        if pixel.len() != layout.channels() {
            return Err(RecognitionError::InvalidBuffer(format!(
                "fill pixel has {} channels, {layout:?} needs {}",
                pixel.len(),
                layout.channels()
            )));
        }
        let data = pixel.repeat(width as usize * height as usize);
        Self::new(width, height, layout, data)
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PlaneLayout::Rgb,
            data: image.into_raw(),
        }
    }

    pub fn from_gray_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PlaneLayout::Gray,
            data: image.into_raw(),
        }
    }

    /// Alpha is dropped; palette and 16-bit inputs are narrowed to 8-bit RGB.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from_rgb_image(image.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn layout(&self) -> PlaneLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * channels;
        Some(&self.data[start..start + channels])
    }

    /// Copy out one named plane as a single-channel image.
    pub fn plane(&self, plane: Plane) -> Result<GrayImage> {
        let (layout, index) = plane.locate();
        if layout != self.layout {
            return Err(RecognitionError::PlaneMismatch {
                plane,
                layout: self.layout,
            });
        }
        let channels = self.channels();
        let values: Vec<u8> = self
            .data
            .iter()
            .skip(index)
            .step_by(channels)
            .copied()
            .collect();
        GrayImage::from_raw(self.width, self.height, values)
            .ok_or_else(|| RecognitionError::InvalidBuffer("plane size mismatch".to_string()))
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let data = match self.layout {
            PlaneLayout::Rgb => self.data.clone(),
            PlaneLayout::Gray => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            other => {
                return Err(RecognitionError::InvalidBuffer(format!(
                    "{other:?} buffers must be converted back to RGB explicitly"
                )));
            }
        };
        RgbImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| RecognitionError::InvalidBuffer("RGB size mismatch".to_string()))
    }

    /// Luma with weights 0.299, 0.587, 0.114.
    pub fn to_gray(&self) -> Result<RasterBuffer> {
        match self.layout {
            PlaneLayout::Gray => Ok(self.clone()),
            PlaneLayout::Rgb => Ok(self.map_rgb(PlaneLayout::Gray, |[r, g, b]| {
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                vec![luma.round().clamp(0.0, 255.0) as u8]
            })),
            other => Err(RecognitionError::PlaneMismatch {
                plane: Plane::Intensity,
                layout: other,
            }),
        }
    }

    pub fn to_gray_image(&self) -> Result<GrayImage> {
        self.to_gray()?.plane(Plane::Intensity)
    }

    pub fn to_hsv(&self) -> Result<RasterBuffer> {
        self.require_rgb(Plane::Hue)?;
        Ok(self.map_rgb(PlaneLayout::Hsv, |rgb| rgb_to_hsv(rgb).to_vec()))
    }

    pub fn to_lab(&self) -> Result<RasterBuffer> {
        self.require_rgb(Plane::Lightness)?;
        Ok(self.map_rgb(PlaneLayout::Lab, |rgb| rgb_to_lab(rgb).to_vec()))
    }

    fn require_rgb(&self, wanted: Plane) -> Result<()> {
        if self.layout == PlaneLayout::Rgb {
            Ok(())
        } else {
            Err(RecognitionError::PlaneMismatch {
                plane: wanted,
                layout: self.layout,
            })
        }
    }

    fn map_rgb<F>(&self, layout: PlaneLayout, convert: F) -> RasterBuffer
    where
        F: Fn([u8; 3]) -> Vec<u8>,
    {
        let data = self
            .data
            .chunks_exact(3)
            .flat_map(|px| convert([px[0], px[1], px[2]]))
            .collect();
        RasterBuffer {
            width: self.width,
            height: self.height,
            layout,
            data,
        }
    }

    /// Keep pixels where `mask` is non-zero, paint the rest with `fill`.
    pub fn composite_onto(&self, mask: &GrayImage, fill: &[u8]) -> Result<RasterBuffer> {
        if mask.dimensions() != self.dimensions() {
            return Err(RecognitionError::InvalidBuffer(format!(
                "mask is {:?}, buffer is {:?}",
                mask.dimensions(),
                self.dimensions()
            )));
        }
        let mut canvas = RasterBuffer::filled(self.width, self.height, self.layout, fill)?;
        let channels = self.channels();
        for (i, Luma([m])) in mask.pixels().enumerate() {
            if *m != 0 {
                let start = i * channels;
                canvas.data[start..start + channels]
                    .copy_from_slice(&self.data[start..start + channels]);
            }
        }
        Ok(canvas)
    }
}

/// Hue is degrees / 2 so it fits a byte.
pub(crate) fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    [
        ((hue / 2.0).round() as u32 % 180) as u8,
        saturation.round().clamp(0.0, 255.0) as u8,
        max as u8,
    ]
}

fn srgb_to_linear(v: u8) -> f32 {
    let v = v as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// sRGB (D65) to 8-bit LAB: L scaled to `[0, 255]`, a/b offset by 128.
pub(crate) fn rgb_to_lab([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let lightness = if y > 0.008856 {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);

    [
        (lightness * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        (a + 128.0).round().clamp(0.0, 255.0) as u8,
        (b + 128.0).round().clamp(0.0, 255.0) as u8,
    ]
}
