use std::{
    fs,
    path::{Path, PathBuf},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::RectangleGrouper,
    cascade::DetectorParams,
    codec::DEFAULT_JPEG_QUALITY,
    error::{RecognitionError, Result},
    segment::{ContourBoundingBoxSegmenter, HueBackgroundSegmenter},
    types::StrokeColor,
};

/// Multi-scale detector settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ratio between consecutive pyramid levels
    #[schemars(range(min = 1.01, max = 4.0))]
    pub scale_factor: f64,
    /// Smallest reported window as `[width, height]`
    pub min_size: Option<[u32; 2]>,
    /// Largest reported window as `[width, height]`
    pub max_size: Option<[u32; 2]>,
    /// Neighbor count a cluster must exceed; 0 returns raw matches
    pub min_neighbors: u32,
    /// Relative similarity used when grouping matches
    pub group_eps: f64,
    /// Equalize the gray histogram before scanning
    pub equalize: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_size: None,
            max_size: None,
            min_neighbors: 0,
            group_eps: 0.2,
            equalize: false,
        }
    }
}

/// Hue background removal settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct HueConfig {
    pub blur_size: u32,
    pub dilate_iterations: u32,
    pub erode_iterations: u32,
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            blur_size: 5,
            dilate_iterations: 1,
            erode_iterations: 3,
        }
    }
}

/// Chroma bounding-box settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ContourConfig {
    pub block_size: u32,
    /// Constant subtracted from the neighborhood mean
    pub offset: i32,
    pub dilate_radius: u8,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            block_size: 3,
            offset: 2,
            dilate_radius: 1,
        }
    }
}

/// Outline color per operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct StrokeConfig {
    pub face: StrokeColor,
    pub eye: StrokeColor,
    pub white_background: StrokeColor,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            face: StrokeColor::GREEN,
            eye: StrokeColor::GREEN,
            white_background: StrokeColor::RED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    pub face_model: PathBuf,
    pub eye_model: PathBuf,
    pub detector: DetectorConfig,
    pub hue: HueConfig,
    pub contour: ContourConfig,
    pub strokes: StrokeConfig,
    #[schemars(range(min = 1, max = 100))]
    pub jpeg_quality: u8,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            face_model: PathBuf::from("haarcascades/haarcascade_frontalface_alt.xml"),
            eye_model: PathBuf::from("haarcascades/haarcascade_eye.xml"),
            detector: DetectorConfig::default(),
            hue: HueConfig::default(),
            contour: ContourConfig::default(),
            strokes: StrokeConfig::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ProcessorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: ProcessorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(RecognitionError::UnsupportedConfigFormat),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ProcessorConfig)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RecognitionError::Config(msg));

        if !(self.detector.scale_factor > 1.0) || !self.detector.scale_factor.is_finite() {
            return invalid(format!(
                "detector.scale_factor must be greater than 1, got {}",
                self.detector.scale_factor
            ));
        }
        if let (Some(min), Some(max)) = (self.detector.min_size, self.detector.max_size) {
            if min[0] > max[0] || min[1] > max[1] {
                return invalid(format!("detector.min_size {min:?} exceeds max_size {max:?}"));
            }
        }
        if self.detector.min_neighbors > 0 && !(self.detector.group_eps > 0.0) {
            return invalid(format!(
                "detector.group_eps must be positive when grouping, got {}",
                self.detector.group_eps
            ));
        }
        if self.hue.blur_size == 0 || self.hue.blur_size % 2 == 0 {
            return invalid(format!("hue.blur_size must be odd and positive, got {}", self.hue.blur_size));
        }
        if self.contour.block_size < 3 || self.contour.block_size % 2 == 0 {
            return invalid(format!(
                "contour.block_size must be odd and at least 3, got {}",
                self.contour.block_size
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!("jpeg_quality must be within 1-100, got {}", self.jpeg_quality));
        }
        Ok(())
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            scale_factor: self.detector.scale_factor,
            min_size: self.detector.min_size.map(|[w, h]| (w, h)),
            max_size: self.detector.max_size.map(|[w, h]| (w, h)),
            equalize: self.detector.equalize,
        }
    }

    pub fn grouper(&self) -> RectangleGrouper {
        RectangleGrouper::new(self.detector.min_neighbors, self.detector.group_eps)
    }

    pub fn hue_segmenter(&self) -> HueBackgroundSegmenter {
        HueBackgroundSegmenter {
            blur_size: self.hue.blur_size,
            dilate_iterations: self.hue.dilate_iterations,
            erode_iterations: self.hue.erode_iterations,
        }
    }

    pub fn contour_segmenter(&self) -> ContourBoundingBoxSegmenter {
        ContourBoundingBoxSegmenter {
            block_size: self.contour.block_size,
            offset: self.contour.offset,
            dilate_radius: self.contour.dilate_radius,
            ..Default::default()
        }
    }
}
