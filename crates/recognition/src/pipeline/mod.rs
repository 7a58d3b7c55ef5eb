pub mod builder;

use image::GrayImage;
use tracing::debug;
use crate::{error::Result, traits::MaskStage};

/// An ordered list of single-plane mask stages applied in sequence
pub struct MaskPipeline {
    stages: Vec<Box<dyn MaskStage>>,
}

impl MaskPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::MaskPipelineBuilder {
        builder::MaskPipelineBuilder::new()
    }

    pub fn new(stages: Vec<Box<dyn MaskStage>>) -> Self {
        Self { stages }
    }

    /// Run the plane through every stage; an empty pipeline returns a copy
    pub fn process(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut mask = image.clone();
        for stage in &self.stages {
            mask = stage.apply(&mask)?;
            debug!(stage = stage.name(), "Applied mask stage");
        }
        Ok(mask)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        format!("MaskPipeline: {} stages [{}]", self.stages.len(), names.join(" -> "))
    }
}

impl MaskStage for MaskPipeline {
    fn apply(&self, image: &GrayImage) -> Result<GrayImage> {
        self.process(image)
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl std::fmt::Debug for MaskPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.info())
    }
}
