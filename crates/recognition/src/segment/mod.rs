pub mod contour;
pub mod hue;

pub use contour::ContourBoundingBoxSegmenter;
pub use hue::{HueBackgroundSegmenter, HueMask};
