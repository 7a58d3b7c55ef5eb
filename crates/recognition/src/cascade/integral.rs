use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image};

/// Sum, squared-sum and optional 45-degree integral tables of one gray image.
///
/// Every table is `(width + 1) x (height + 1)` with a zero first row and column.
/// The tilted table holds at `(X, Y)` the sum of all pixels `(x, y)` with
/// `y < Y` and `|x - X + 1| <= Y - y - 1`.
pub struct IntegralImages {
    stride: usize,
    sum: Vec<u64>,
    squares: Vec<u64>,
    tilted: Option<Vec<i64>>,
}

impl IntegralImages {
    pub fn new(gray: &GrayImage, with_tilted: bool) -> Self {
        let sum = integral_image::<_, u64>(gray).into_raw();
        let squares = integral_squared_image::<_, u64>(gray).into_raw();
        let tilted = with_tilted.then(|| tilted_integral(gray));
        Self {
            stride: gray.width() as usize + 1,
            sum,
            squares,
            tilted,
        }
    }

    fn at(&self, table: &[u64], x: u32, y: u32) -> u64 {
        table[y as usize * self.stride + x as usize]
    }

    fn table_rect(&self, table: &[u64], x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x1, y1) = (x + w, y + h);
        (self.at(table, x1, y1) + self.at(table, x, y)) - (self.at(table, x1, y) + self.at(table, x, y1))
    }

    /// Sum of pixel values in the upright rectangle.
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        self.table_rect(&self.sum, x, y, w, h)
    }

    pub fn squared_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        self.table_rect(&self.squares, x, y, w, h)
    }

    pub fn tilted_at(&self, x: u32, y: u32) -> Option<i64> {
        self.tilted
            .as_ref()
            .map(|t| t[y as usize * self.stride + x as usize])
    }

    /// Sum over a 45-degree rotated rectangle anchored at its top corner.
    /// Zero when the tilted table was not built.
    pub fn tilted_sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let Some(t) = self.tilted.as_ref() else {
            return 0;
        };
        let at = |x: u32, y: u32| t[y as usize * self.stride + x as usize];
        at(x, y) - at(x - h, y + h) - at(x + w, y + w) + at(x + w - h, y + w + h)
    }

    /// `1 / sqrt(area * sqsum - sum^2)` over the window shrunk by one pixel on
    /// each side, or 1 when that quantity is not positive.
    pub fn inverse_norm_factor(&self, x: u32, y: u32, window_width: u32, window_height: u32) -> f64 {
        let (nx, nw) = shrink(x, window_width);
        let (ny, nh) = shrink(y, window_height);
        let area = nw as f64 * nh as f64;
        let sum = self.rect_sum(nx, ny, nw, nh) as f64;
        let squares = self.squared_sum(nx, ny, nw, nh) as f64;
        let nf = area * squares - sum * sum;
        if nf > 0.0 { 1.0 / nf.sqrt() } else { 1.0 }
    }
}

fn shrink(origin: u32, extent: u32) -> (u32, u32) {
    if extent > 2 { (origin + 1, extent - 2) } else { (origin, extent) }
}

/// Build the tilted table from the cone sums
/// `Tri(x, y) = Tri(x-1, y-1) + Tri(x+1, y-1) - Tri(x, y-2) + I(x, y) + I(x, y-1)`,
/// evaluated over columns padded by the image height so that cones whose apex
/// lies left or right of the image are still accounted for.
fn tilted_integral(gray: &GrayImage) -> Vec<i64> {
    let (width, height) = (gray.width() as i64, gray.height() as i64);
    let pad = height + 1;
    let cols = width + 2 * pad;

    let pixel = |x: i64, y: i64| -> i64 {
        if x < 0 || y < 0 || x >= width || y >= height {
            0
        } else {
            gray.get_pixel(x as u32, y as u32)[0] as i64
        }
    };
    let cone = |tri: &[i64], x: i64, y: i64| -> i64 {
        let col = x + pad;
        if y < 0 || col < 0 || col >= cols {
            0
        } else {
            tri[(y * cols + col) as usize]
        }
    };

    let mut tri = vec![0i64; (cols * height) as usize];
    for y in 0..height {
        for col in 0..cols {
            let x = col - pad;
            let value = cone(&tri, x - 1, y - 1) + cone(&tri, x + 1, y - 1) - cone(&tri, x, y - 2)
                + pixel(x, y)
                + pixel(x, y - 1);
            tri[(y * cols + col) as usize] = value;
        }
    }

    let stride = width + 1;
    let mut table = vec![0i64; (stride * (height + 1)) as usize];
    for y in 1..=height {
        for x in 0..=width {
            table[(y * stride + x) as usize] = cone(&tri, x - 1, y - 1);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| image::Luma([((x * 7 + y * 13) % 251) as u8]))
    }

    fn brute_tilted(gray: &GrayImage, big_x: i64, big_y: i64) -> i64 {
        let mut total = 0;
        for y in 0..gray.height() as i64 {
            for x in 0..gray.width() as i64 {
                if y < big_y && (x - big_x + 1).abs() <= big_y - y - 1 {
                    total += gray.get_pixel(x as u32, y as u32)[0] as i64;
                }
            }
        }
        total
    }

    #[test]
    fn tilted_table_matches_definition() {
        let gray = ramp(9, 6);
        let integrals = IntegralImages::new(&gray, true);
        for y in 0..=6u32 {
            for x in 0..=9u32 {
                assert_eq!(
                    integrals.tilted_at(x, y),
                    Some(brute_tilted(&gray, x as i64, y as i64)),
                    "mismatch at ({x}, {y})"
                );
            }
        }
    }

    /// Pixels of the rotated rectangle: `x + y - 2 < u <= x + y + 2w - 2` and
    /// `y - x < v <= y - x + 2h` with `u = px + py` and `v = py - px`.
    fn brute_tilted_rect(gray: &GrayImage, x: i64, y: i64, w: i64, h: i64) -> i64 {
        let mut total = 0;
        for py in 0..gray.height() as i64 {
            for px in 0..gray.width() as i64 {
                let (u, v) = (px + py, py - px);
                if u > x + y - 2 && u <= x + y + 2 * w - 2 && v > y - x && v <= y - x + 2 * h {
                    total += gray.get_pixel(px as u32, py as u32)[0] as i64;
                }
            }
        }
        total
    }

    #[test]
    fn tilted_sums_match_rotated_rectangles() {
        let gray = ramp(12, 10);
        let integrals = IntegralImages::new(&gray, true);
        for (x, y, w, h) in [(2, 0, 1, 1), (3, 0, 2, 2), (4, 1, 3, 2), (5, 2, 1, 4), (2, 0, 4, 1), (6, 3, 3, 3)] {
            assert_eq!(
                integrals.tilted_sum(x, y, w, h),
                brute_tilted_rect(&gray, x as i64, y as i64, w as i64, h as i64),
                "mismatch for ({x}, {y}, {w}, {h})"
            );
        }
    }

    #[test]
    fn tilted_rectangle_covers_twice_its_sides() {
        let gray = GrayImage::from_pixel(12, 10, image::Luma([1]));
        let integrals = IntegralImages::new(&gray, true);
        assert_eq!(integrals.tilted_sum(2, 0, 1, 1), 2);
        assert_eq!(integrals.tilted_sum(4, 1, 3, 2), 12);
    }

    #[test]
    fn tilted_table_is_optional() {
        let integrals = IntegralImages::new(&ramp(4, 4), false);
        assert_eq!(integrals.tilted_at(1, 1), None);
        assert_eq!(integrals.tilted_sum(2, 0, 1, 1), 0);
    }

    #[test]
    fn rect_sums_match_brute_force() {
        let gray = ramp(12, 10);
        let integrals = IntegralImages::new(&gray, false);
        let mut expected = 0u64;
        let mut expected_sq = 0u64;
        for y in 2..7 {
            for x in 3..11 {
                let v = gray.get_pixel(x, y)[0] as u64;
                expected += v;
                expected_sq += v * v;
            }
        }
        assert_eq!(integrals.rect_sum(3, 2, 8, 5), expected);
        assert_eq!(integrals.squared_sum(3, 2, 8, 5), expected_sq);
    }

    #[test]
    fn flat_window_has_unit_norm() {
        let gray = GrayImage::from_pixel(20, 20, image::Luma([90]));
        let integrals = IntegralImages::new(&gray, false);
        assert_eq!(integrals.inverse_norm_factor(0, 0, 20, 20), 1.0);
    }
}
