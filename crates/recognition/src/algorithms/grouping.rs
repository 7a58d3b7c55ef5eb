use tracing::debug;
use crate::{error::Result, traits::DetectionPostProcessor, types::Rectangle};

/// Merges clusters of overlapping detections into averaged rectangles.
///
/// Two rectangles belong to the same cluster when every edge lies within
/// `eps * (min_width + min_height) / 2` of the other's. Clusters with no
/// more than `min_neighbors` members are dropped, as are small clusters
/// nested inside a stronger one. `min_neighbors == 0` passes detections
/// through untouched.
#[derive(Debug, Clone)]
pub struct RectangleGrouper {
    pub min_neighbors: u32,
    pub eps: f64,
}

impl Default for RectangleGrouper {
    fn default() -> Self {
        Self {
            min_neighbors: 0,
            eps: 0.2,
        }
    }
}

impl RectangleGrouper {
    pub fn new(min_neighbors: u32, eps: f64) -> Self {
        Self { min_neighbors, eps }
    }

    fn similar(&self, a: &Rectangle, b: &Rectangle) -> bool {
        let delta = self.eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
        let near = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
        near(a.x, b.x) && near(a.y, b.y) && near(a.right(), b.right()) && near(a.bottom(), b.bottom())
    }

    fn cluster_labels(&self, rects: &[Rectangle]) -> (Vec<usize>, usize) {
        let mut parent: Vec<usize> = (0..rects.len()).collect();

        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if self.similar(&rects[i], &rects[j]) {
                    let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                    if a != b {
                        parent[b] = a;
                    }
                }
            }
        }

        let mut class_of_root = vec![usize::MAX; rects.len()];
        let mut classes = 0;
        let mut labels = Vec::with_capacity(rects.len());
        for i in 0..rects.len() {
            let r = root(&mut parent, i);
            if class_of_root[r] == usize::MAX {
                class_of_root[r] = classes;
                classes += 1;
            }
            labels.push(class_of_root[r]);
        }
        (labels, classes)
    }
}

impl DetectionPostProcessor for RectangleGrouper {
    fn process(&self, detections: Vec<Rectangle>) -> Result<Vec<Rectangle>> {
        if self.min_neighbors == 0 || detections.is_empty() {
            return Ok(detections);
        }

        let (labels, classes) = self.cluster_labels(&detections);

        // Edges are averaged so a cluster never reaches past its members.
        let mut sums = vec![[0u64; 4]; classes];
        let mut weights = vec![0u32; classes];
        for (rect, &label) in detections.iter().zip(&labels) {
            let sum = &mut sums[label];
            sum[0] += rect.x as u64;
            sum[1] += rect.y as u64;
            sum[2] += rect.right() as u64;
            sum[3] += rect.bottom() as u64;
            weights[label] += 1;
        }

        let averaged: Vec<Rectangle> = sums
            .iter()
            .zip(&weights)
            .map(|(sum, &n)| {
                let avg = |v: u64| (v as f64 / n as f64).round() as u32;
                let (x, y) = (avg(sum[0]), avg(sum[1]));
                Rectangle::new(x, y, avg(sum[2]) - x, avg(sum[3]) - y)
            })
            .collect();

        let mut grouped = Vec::new();
        for (i, r1) in averaged.iter().enumerate() {
            let n1 = weights[i];
            if n1 <= self.min_neighbors {
                continue;
            }

            let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
                let n2 = weights[j];
                if j == i || n2 <= self.min_neighbors {
                    return false;
                }
                let dx = (r2.width as f64 * self.eps).round() as i64;
                let dy = (r2.height as f64 * self.eps).round() as i64;
                r1 != r2
                    && r1.x as i64 >= r2.x as i64 - dx
                    && r1.y as i64 >= r2.y as i64 - dy
                    && r1.right() as i64 <= r2.right() as i64 + dx
                    && r1.bottom() as i64 <= r2.bottom() as i64 + dy
                    && (n2 > n1.max(3) || n1 < 3)
            });

            if !swallowed {
                grouped.push(*r1);
            }
        }

        debug!(
            raw = detections.len(),
            clusters = classes,
            kept = grouped.len(),
            "Grouped detections"
        );

        Ok(grouped)
    }
}
