use serde::{Deserialize, Serialize};

use super::integral::IntegralImages;

/// One weighted rectangle of a Haar feature, relative to the detection window.
///
/// For tilted features `(x, y)` is the top corner of a rectangle rotated by
/// 45 degrees; `width` runs down-right and `height` runs down-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
    #[serde(default)]
    pub tilted: bool,
}

/// Split node of a weak classifier tree.
///
/// Child values greater than zero index another node of the same tree;
/// values at or below zero select leaf `-child`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    pub feature: usize,
    pub threshold: f32,
    pub left: i32,
    pub right: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakClassifier {
    pub nodes: Vec<DecisionNode>,
    pub leaves: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

/// Immutable boosted cascade of Haar-feature trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeModel {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<Stage>,
    pub features: Vec<HaarFeature>,
}

impl CascadeModel {
    pub fn window(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn has_tilted(&self) -> bool {
        self.features.iter().any(|f| f.tilted)
    }

    pub fn classifier_count(&self) -> usize {
        self.stages.iter().map(|s| s.classifiers.len()).sum()
    }

    /// Structural checks that make evaluation panic-free.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(format!(
                "window must be non-zero, got {}x{}",
                self.window_width, self.window_height
            ));
        }

        for (fi, feature) in self.features.iter().enumerate() {
            if feature.rects.is_empty() {
                return Err(format!("feature {fi} has no rectangles"));
            }
            for rect in &feature.rects {
                if !self.rect_inside_window(rect, feature.tilted) {
                    return Err(format!(
                        "feature {fi} rectangle ({}, {}, {}, {}) exceeds the {}x{} window",
                        rect.x, rect.y, rect.width, rect.height, self.window_width, self.window_height
                    ));
                }
            }
        }

        for (si, stage) in self.stages.iter().enumerate() {
            for (ci, classifier) in stage.classifiers.iter().enumerate() {
                self.validate_tree(classifier)
                    .map_err(|reason| format!("stage {si} classifier {ci}: {reason}"))?;
            }
        }

        Ok(())
    }

    fn validate_tree(&self, classifier: &WeakClassifier) -> std::result::Result<(), String> {
        if classifier.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        if classifier.leaves.is_empty() {
            return Err("tree has no leaves".to_string());
        }

        let node_count = classifier.nodes.len() as i64;
        let leaf_count = classifier.leaves.len() as i64;
        for (ni, node) in classifier.nodes.iter().enumerate() {
            if node.feature >= self.features.len() {
                return Err(format!(
                    "node {ni} references feature {} of {}",
                    node.feature,
                    self.features.len()
                ));
            }
            for child in [node.left, node.right] {
                let child = child as i64;
                let valid = if child > 0 {
                    child > ni as i64 && child < node_count
                } else {
                    -child < leaf_count
                };
                if !valid {
                    return Err(format!("node {ni} has dangling child {child}"));
                }
            }
        }
        Ok(())
    }

    fn rect_inside_window(&self, rect: &WeightedRect, tilted: bool) -> bool {
        let (w, h) = (self.window_width as u64, self.window_height as u64);
        let (x, y, rw, rh) = (rect.x as u64, rect.y as u64, rect.width as u64, rect.height as u64);
        if tilted {
            x >= rh && x + rw <= w && y + rw + rh <= h
        } else {
            x + rw <= w && y + rh <= h
        }
    }

    /// Run every stage on the window whose top-left corner is `(x, y)`.
    pub(crate) fn classify(&self, integrals: &IntegralImages, x: u32, y: u32) -> bool {
        let inv_norm = integrals.inverse_norm_factor(x, y, self.window_width, self.window_height);

        for stage in &self.stages {
            let sum: f64 = stage
                .classifiers
                .iter()
                .map(|classifier| self.evaluate_tree(classifier, integrals, x, y, inv_norm))
                .sum();
            if sum < stage.threshold as f64 {
                return false;
            }
        }
        true
    }

    fn evaluate_tree(
        &self,
        classifier: &WeakClassifier,
        integrals: &IntegralImages,
        x: u32,
        y: u32,
        inv_norm: f64,
    ) -> f64 {
        let mut idx = 0i32;
        loop {
            let node = &classifier.nodes[idx as usize];
            let value = self.feature_value(&self.features[node.feature], integrals, x, y) * inv_norm;
            idx = if value < node.threshold as f64 { node.left } else { node.right };
            if idx <= 0 {
                break;
            }
        }
        classifier.leaves[(-idx) as usize] as f64
    }

    fn feature_value(&self, feature: &HaarFeature, integrals: &IntegralImages, x: u32, y: u32) -> f64 {
        feature
            .rects
            .iter()
            .map(|r| {
                let sum = if feature.tilted {
                    integrals.tilted_sum(x + r.x, y + r.y, r.width, r.height)
                } else {
                    integrals.rect_sum(x + r.x, y + r.y, r.width, r.height) as i64
                };
                r.weight as f64 * sum as f64
            })
            .sum()
    }
}
