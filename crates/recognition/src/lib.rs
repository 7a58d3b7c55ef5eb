//! # Photo Recognition Library
//!
//! Decodes photos, finds objects in them and returns annotated JPEG bytes.
//!
//! ## Core Features
//!
//! - **Cascade Detection**: multi-scale Haar cascades loaded from OpenCV XML or JSON
//! - **Model Cache**: each model file is parsed once per process and shared
//! - **Hue Segmentation**: white-out everything outside an average-hue mask
//! - **Chroma Bounding Box**: box the one object standing out on a light background
//! - **Mask Pipeline**: composable threshold, blur and morphology stages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recognition::{ImageProcessor, ProcessorConfig, RecognitionCommand};
//!
//! let processor = ImageProcessor::new(ProcessorConfig::default())?;
//! let photo = std::fs::read("portrait.jpg")?;
//! let annotated = processor.execute(RecognitionCommand::DetectFace, &photo)?;
//! std::fs::write("faces.jpg", annotated)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Mask Pipeline
//!
//! ```rust,no_run
//! use recognition::MaskPipeline;
//!
//! let pipeline = MaskPipeline::builder()
//!     .threshold(30.0, 179)
//!     .box_blur(5)
//!     .dilate(1)
//!     .erode(3)
//!     .build();
//! let mask = pipeline.process(&image::GrayImage::new(64, 64))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod raster;
pub mod algorithms;
pub mod pipeline;
pub mod cascade;
pub mod segment;
pub mod annotate;
pub mod codec;
pub mod config;
pub mod processor;

// Re-exports for convenience
pub use error::{RecognitionError, Result};
pub use types::{ContourPointSet, HueHistogram, Rectangle, StrokeColor};
pub use traits::*;
pub use raster::{Plane, PlaneLayout, RasterBuffer};
pub use algorithms::*;
pub use pipeline::{MaskPipeline, builder::MaskPipelineBuilder};
pub use cascade::{CascadeDetector, CascadeModel, DetectorParams, ModelCache};
pub use segment::{ContourBoundingBoxSegmenter, HueBackgroundSegmenter};
pub use annotate::Annotator;
pub use codec::{decode, encode_jpeg};
pub use config::ProcessorConfig;
pub use processor::{ImageProcessor, RecognitionCommand};
