use std::path::PathBuf;

use thiserror::Error;

use crate::raster::{Plane, PlaneLayout};

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Failed to load detection model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Plane {plane:?} is not available in a {layout:?} buffer")]
    PlaneMismatch { plane: Plane, layout: PlaneLayout },

    #[error("Invalid raster buffer: {0}")]
    InvalidBuffer(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported configuration format. Please use .toml or .json files")]
    UnsupportedConfigFormat,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RecognitionError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures caused by the request payload rather than the deployment.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, RecognitionError>;
