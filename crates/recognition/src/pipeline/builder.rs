use crate::{
    pipeline::MaskPipeline,
    traits::MaskStage,
    algorithms::{
        AdaptiveMeanThreshold,
        BinaryThreshold,
        BoxBlur,
        Dilate,
        Erode,
        HistogramEqualization,
        SquareDilation,
    },
};

/// Builder for mask pipelines with a fluent API
pub struct MaskPipelineBuilder {
    stages: Vec<Box<dyn MaskStage>>,
}

impl MaskPipelineBuilder {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append any stage to the pipeline
    pub fn add_stage<S>(mut self, stage: S) -> Self
    where
        S: MaskStage + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn threshold(self, threshold: f64, max_value: u8) -> Self {
        self.add_stage(BinaryThreshold { threshold, max_value })
    }

    pub fn box_blur(self, size: u32) -> Self {
        self.add_stage(BoxBlur { size })
    }

    /// Grayscale 3x3 dilation; zero iterations adds nothing
    pub fn dilate(self, iterations: u32) -> Self {
        if iterations == 0 {
            return self;
        }
        self.add_stage(Dilate { iterations })
    }

    /// Grayscale 3x3 erosion; zero iterations adds nothing
    pub fn erode(self, iterations: u32) -> Self {
        if iterations == 0 {
            return self;
        }
        self.add_stage(Erode { iterations })
    }

    pub fn square_dilation(self, radius: u8) -> Self {
        if radius == 0 {
            return self;
        }
        self.add_stage(SquareDilation { radius })
    }

    pub fn adaptive_mean_threshold(self, block_size: u32, offset: i32, inverted: bool) -> Self {
        self.add_stage(AdaptiveMeanThreshold {
            block_size,
            offset,
            inverted,
            max_value: 255,
        })
    }

    pub fn equalize(self) -> Self {
        self.add_stage(HistogramEqualization)
    }

    pub fn build(self) -> MaskPipeline {
        MaskPipeline::new(self.stages)
    }

    /// Hue mask: threshold at the average hue, blur, dilate, erode, threshold again
    pub fn build_hue_mask(
        average_hue: f64,
        blur_size: u32,
        dilate_iterations: u32,
        erode_iterations: u32,
    ) -> MaskPipeline {
        Self::new()
            .threshold(average_hue, 179)
            .box_blur(blur_size)
            .dilate(dilate_iterations)
            .erode(erode_iterations)
            .threshold(average_hue, 179)
            .build()
    }

    /// Chroma mask: inverted adaptive mean threshold followed by a square dilation
    pub fn build_chroma_mask(block_size: u32, offset: i32, dilate_radius: u8) -> MaskPipeline {
        Self::new()
            .adaptive_mean_threshold(block_size, offset, true)
            .square_dilation(dilate_radius)
            .build()
    }
}

impl Default for MaskPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iteration_morphology_is_skipped() {
        let pipeline = MaskPipelineBuilder::new().dilate(0).erode(0).square_dilation(0).build();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn presets_follow_their_parameters() {
        let hue = MaskPipelineBuilder::build_hue_mask(30.0, 5, 1, 3);
        assert_eq!(
            hue.info(),
            "MaskPipeline: 5 stages [threshold -> box_blur -> dilate -> erode -> threshold]"
        );
        assert_eq!(MaskPipelineBuilder::build_hue_mask(30.0, 3, 0, 2).len(), 4);

        assert_eq!(MaskPipelineBuilder::build_chroma_mask(3, 2, 1).len(), 2);
        assert_eq!(MaskPipelineBuilder::build_chroma_mask(5, 2, 0).len(), 1);
    }
}
