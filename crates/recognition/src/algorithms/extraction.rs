use image::GrayImage;
use imageproc::point::Point;
use crate::{error::Result, traits::ContourExtractor, types::ContourPointSet};

/// Imageproc-based contour extractor.
///
/// Returns outer borders and hole borders alike. With `compress_runs` set,
/// straight horizontal, vertical and diagonal runs keep only their end points.
#[derive(Debug, Clone)]
pub struct ImageprocContourExtractor {
    pub compress_runs: bool,
}

impl Default for ImageprocContourExtractor {
    fn default() -> Self {
        Self { compress_runs: true }
    }
}

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<ContourPointSet>> {
        let contours = imageproc::contours::find_contours::<i32>(mask);

        let result = contours
            .into_iter()
            .map(|contour| {
                if self.compress_runs {
                    ContourPointSet::new(compress_runs(&contour.points))
                } else {
                    ContourPointSet::new(contour.points)
                }
            })
            .collect();

        Ok(result)
    }
}

/// Drop every point whose incoming and outgoing steps share a direction.
/// The contour is treated as closed.
fn compress_runs(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| ((to.x - from.x).signum(), (to.y - from.y).signum());

    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}
