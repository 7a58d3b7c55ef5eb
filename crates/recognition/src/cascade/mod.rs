//! Haar cascade detection: model storage, loading, caching and scanning.

pub mod cache;
pub mod detector;
pub mod integral;
pub mod loader;
pub mod model;

pub use cache::ModelCache;
pub use detector::{CascadeDetector, DetectorParams};
pub use integral::IntegralImages;
pub use loader::load_model;
pub use model::{CascadeModel, DecisionNode, HaarFeature, Stage, WeakClassifier, WeightedRect};
