use image::{GrayImage, Rgb};
use imageproc::point::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The zero-size rectangle at the origin.
    pub fn degenerate() -> Self {
        Self::default()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Shrink so the rectangle lies inside a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rectangle {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rectangle {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    /// Minimal rectangle enclosing every point; degenerate when there are none.
    pub fn bounding<'a, I>(points: I) -> Rectangle
    where
        I: IntoIterator<Item = &'a Point<i32>>,
    {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for p in points {
            bounds = Some(match bounds {
                None => (p.x, p.y, p.x, p.y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
                }
            });
        }

        match bounds {
            None => Rectangle::degenerate(),
            Some((min_x, min_y, max_x, max_y)) => {
                let min_x = min_x.max(0);
                let min_y = min_y.max(0);
                Rectangle {
                    x: min_x as u32,
                    y: min_y as u32,
                    width: (max_x - min_x + 1).max(0) as u32,
                    height: (max_y - min_y + 1).max(0) as u32,
                }
            }
        }
    }
}

/// Counts of hue values over the `[0, 179]` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HueHistogram {
    counts: [u64; HueHistogram::BUCKETS],
}

impl HueHistogram {
    pub const BUCKETS: usize = 180;

    /// Values above 179 cannot come out of the HSV conversion; they are folded
    /// into the last bucket.
    pub fn from_plane(hue: &GrayImage) -> Self {
        let mut counts = [0u64; Self::BUCKETS];
        for pixel in hue.pixels() {
            let bucket = (pixel[0] as usize).min(Self::BUCKETS - 1);
            counts[bucket] += 1;
        }
        Self { counts }
    }

    pub fn counts(&self) -> &[u64; Self::BUCKETS] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `Σ count[h] * h / pixel_count`; zero for an empty histogram.
    pub fn average(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: u64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(hue, &count)| hue as u64 * count)
            .sum();
        weighted as f64 / total as f64
    }
}

/// Boundary points of one connected region, in traversal order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContourPointSet {
    pub points: Vec<Point<i32>>,
}

impl ContourPointSet {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Concatenate the points of every contour into one set.
    pub fn merge(contours: impl IntoIterator<Item = ContourPointSet>) -> ContourPointSet {
        ContourPointSet {
            points: contours.into_iter().flat_map(|c| c.points).collect(),
        }
    }

    pub fn bounding_rect(&self) -> Rectangle {
        Rectangle::bounding(&self.points)
    }
}

/// Outline color used when annotating results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StrokeColor(pub [u8; 3]);

impl StrokeColor {
    pub const GREEN: StrokeColor = StrokeColor([0, 255, 0]);
    pub const RED: StrokeColor = StrokeColor([255, 0, 0]);
    pub const BLUE: StrokeColor = StrokeColor([0, 0, 255]);

    pub fn to_rgb(self) -> Rgb<u8> {
        Rgb(self.0)
    }
}
