use std::{path::Path, sync::Arc};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::{debug, info};

use crate::{
    annotate::Annotator,
    cascade::{CascadeDetector, ModelCache},
    codec::{decode, encode_jpeg},
    config::ProcessorConfig,
    error::Result,
    raster::RasterBuffer,
    traits::{DetectionPostProcessor, ObjectDetector},
    types::{Rectangle, StrokeColor},
};

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecognitionCommand {
    /// Outline every face found by the face cascade
    DetectFace,

    /// Outline every eye found by the eye cascade
    DetectEye,

    /// Box the single object standing out from a light background
    WhiteBackground,

    /// Paint everything outside the hue mask white
    RemoveBackground,
}

impl RecognitionCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RecognitionCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DetectFace => "Detect faces and outline them on the returned JPEG",
            Self::DetectEye => "Detect eyes and outline them on the returned JPEG",
            Self::WhiteBackground => "Outline the foreground object found on a light background",
            Self::RemoveBackground => "Replace pixels outside the estimated foreground with white",
        }
    }
}

/// Entry point for every recognition operation.
///
/// Each call is independent; the only shared state is the read-only model
/// cache, so one processor can serve many threads.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ProcessorConfig,
    cache: Arc<ModelCache>,
}

impl ImageProcessor {
    /// Processor backed by the process-wide model cache
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_cache(config, ModelCache::global())
    }

    pub fn with_cache(config: ProcessorConfig, cache: Arc<ModelCache>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn execute(&self, command: RecognitionCommand, bytes: &[u8]) -> Result<Vec<u8>> {
        debug!(%command, input_bytes = bytes.len(), "Executing command");
        match command {
            RecognitionCommand::DetectFace => self.detect_face(bytes),
            RecognitionCommand::DetectEye => self.detect_eye(bytes),
            RecognitionCommand::WhiteBackground => self.isolate_on_white_background(bytes),
            RecognitionCommand::RemoveBackground => self.remove_background(bytes),
        }
    }

    pub fn detect_face(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.detect_and_outline(bytes, &self.config.face_model, self.config.strokes.face, "face")
    }

    pub fn detect_eye(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.detect_and_outline(bytes, &self.config.eye_model, self.config.strokes.eye, "eye")
    }

    pub fn isolate_on_white_background(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let source = decode(bytes)?;
        let rect = self.locate_foreground(&source)?;
        info!(?rect, "Located foreground object");
        let annotated = Annotator::new(self.config.strokes.white_background).annotate(&source, &[rect])?;
        encode_jpeg(&annotated, self.config.jpeg_quality)
    }

    pub fn remove_background(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let source = decode(bytes)?;
        let composite = self.config.hue_segmenter().segment(&source)?;
        encode_jpeg(&composite, self.config.jpeg_quality)
    }

    /// Run the cascade stored at `model_path` over a decoded image
    pub fn detect_objects(&self, model_path: &Path, source: &RasterBuffer) -> Result<Vec<Rectangle>> {
        let model = self.cache.get_or_load(model_path)?;
        let gray = source.to_gray_image()?;
        let detector = CascadeDetector::new(model, self.config.detector_params());
        let raw = detector.detect(&gray)?;
        self.config.grouper().process(raw)
    }

    pub fn locate_foreground(&self, source: &RasterBuffer) -> Result<Rectangle> {
        self.config.contour_segmenter().bounding_box(source)
    }

    fn detect_and_outline(
        &self,
        bytes: &[u8],
        model_path: &Path,
        stroke: StrokeColor,
        label: &str,
    ) -> Result<Vec<u8>> {
        let source = decode(bytes)?;
        let detections = self.detect_objects(model_path, &source)?;
        info!(
            target_kind = label,
            count = detections.len(),
            width = source.width(),
            height = source.height(),
            "Detection finished"
        );
        let annotated = Annotator::new(stroke).annotate(&source, &detections)?;
        encode_jpeg(&annotated, self.config.jpeg_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cascade::model::tests::center_model, error::RecognitionError};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::{io::Cursor, path::PathBuf, str::FromStr};

    fn png_bytes(img: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn processor_with_models(dir: &Path) -> ImageProcessor {
        let model_path = dir.join("center.json");
        std::fs::write(&model_path, serde_json::to_string(&center_model()).unwrap()).unwrap();
        let config = ProcessorConfig {
            face_model: model_path.clone(),
            eye_model: model_path,
            ..Default::default()
        };
        ImageProcessor::with_cache(config, Arc::new(ModelCache::new())).unwrap()
    }

    fn missing_model_processor() -> ImageProcessor {
        let config = ProcessorConfig {
            face_model: PathBuf::from("missing/face.xml"),
            eye_model: PathBuf::from("missing/eye.xml"),
            ..Default::default()
        };
        ImageProcessor::with_cache(config, Arc::new(ModelCache::new())).unwrap()
    }

    #[test]
    fn black_frame_yields_plain_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor_with_models(dir.path());
        let input = png_bytes(RgbImage::new(640, 480));

        let source = decode(&input).unwrap();
        assert!(processor.detect_objects(&processor.config().face_model, &source).unwrap().is_empty());

        let out = processor.detect_face(&input).unwrap();
        let decoded = decode(&out).unwrap();
        assert_eq!(decoded.dimensions(), (640, 480));
        assert!(decoded.as_bytes().iter().all(|&v| v < 16));
    }

    #[test]
    fn bright_square_is_outlined() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor_with_models(dir.path());
        let img = RgbImage::from_fn(100, 100, |x, y| {
            if (45..55).contains(&x) && (45..55).contains(&y) { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let source = RasterBuffer::from_rgb_image(img.clone());
        let found = processor.detect_objects(&processor.config().eye_model, &source).unwrap();
        assert!(found.contains(&Rectangle::new(40, 40, 20, 20)));
        assert!(found.iter().all(|r| r.fits_within(100, 100)));

        let out = processor.detect_eye(&png_bytes(img)).unwrap();
        assert_eq!(decode(&out).unwrap().dimensions(), (100, 100));
    }

    #[test]
    fn white_background_boxes_the_object() {
        let processor = missing_model_processor();
        let img = RgbImage::from_fn(200, 150, |x, y| {
            if (60..120).contains(&x) && (40..100).contains(&y) { Rgb([0, 0, 200]) } else { Rgb([250, 250, 250]) }
        });
        let input = png_bytes(img);

        let rect = processor.locate_foreground(&decode(&input).unwrap()).unwrap();
        assert!(rect.x.abs_diff(60) <= 2 && rect.y.abs_diff(40) <= 2);
        assert!(rect.width.abs_diff(60) <= 4 && rect.height.abs_diff(60) <= 4);

        let out = processor.execute(RecognitionCommand::WhiteBackground, &input).unwrap();
        assert_eq!(decode(&out).unwrap().dimensions(), (200, 150));
    }

    #[test]
    fn remove_background_keeps_dimensions() {
        let processor = missing_model_processor();
        let img = RgbImage::from_fn(64, 32, |x, _| if x < 32 { Rgb([255, 0, 0]) } else { Rgb([0, 255, 0]) });
        let out = processor.execute(RecognitionCommand::RemoveBackground, &png_bytes(img)).unwrap();
        let decoded = decode(&out).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
        let left = decoded.pixel(4, 16).unwrap();
        assert!(left.iter().all(|&v| v > 230));
    }

    #[test]
    fn corrupt_input_reports_decode_before_model_load() {
        let processor = missing_model_processor();
        let garbage = b"\x89PNG\r\n\x1a\nnot really";
        for command in [
            RecognitionCommand::DetectFace,
            RecognitionCommand::DetectEye,
            RecognitionCommand::WhiteBackground,
            RecognitionCommand::RemoveBackground,
        ] {
            let err = processor.execute(command, garbage).unwrap_err();
            assert!(err.is_decode(), "{command}: {err}");
        }
    }

    #[test]
    fn missing_model_is_a_load_error() {
        let processor = missing_model_processor();
        let err = processor.detect_face(&png_bytes(RgbImage::new(32, 32))).unwrap_err();
        assert!(matches!(err, RecognitionError::ModelLoad { .. }));
    }

    #[test]
    fn command_names_are_snake_case() {
        assert_eq!(
            RecognitionCommand::command_names(),
            &["detect_face", "detect_eye", "white_background", "remove_background"]
        );
        assert_eq!(
            RecognitionCommand::from_str("white_background").unwrap(),
            RecognitionCommand::WhiteBackground
        );
        assert_eq!(
            serde_json::to_string(&RecognitionCommand::RemoveBackground).unwrap(),
            "\"remove_background\""
        );
        assert!(!RecognitionCommand::DetectFace.description().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = ProcessorConfig::default();
        config.jpeg_quality = 0;
        assert!(ImageProcessor::new(config).is_err());
    }
}
