use image::RgbImage;
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
    error::Result,
    raster::RasterBuffer,
    types::{Rectangle, StrokeColor},
};

/// Draws 1-pixel rectangle outlines on a copy of the source
#[derive(Debug, Clone, Copy)]
pub struct Annotator {
    pub stroke: StrokeColor,
}

impl Annotator {
    pub fn new(stroke: StrokeColor) -> Self {
        Self { stroke }
    }

    /// Corners `(x, y)` and `(x + width, y + height)` are both drawn; anything
    /// outside the image is clipped.
    pub fn annotate(&self, source: &RasterBuffer, rects: &[Rectangle]) -> Result<RasterBuffer> {
        let mut canvas = source.to_rgb_image()?;
        for rect in rects {
            self.draw(&mut canvas, rect);
        }
        Ok(RasterBuffer::from_rgb_image(canvas))
    }

    fn draw(&self, canvas: &mut RgbImage, rect: &Rectangle) {
        if rect.x >= canvas.width() || rect.y >= canvas.height() {
            return;
        }
        let outline = Rect::at(rect.x as i32, rect.y as i32)
            .of_size(rect.width.saturating_add(1), rect.height.saturating_add(1));
        draw_hollow_rect_mut(canvas, outline, self.stroke.to_rgb());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn blank(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::from_rgb_image(RgbImage::new(width, height))
    }

    #[test]
    fn outline_includes_far_corner() {
        let out = Annotator::new(StrokeColor::GREEN)
            .annotate(&blank(20, 20), &[Rectangle::new(2, 3, 5, 4)])
            .unwrap();
        let green = [0u8, 255, 0];
        assert_eq!(out.pixel(2, 3), Some(&green[..]));
        assert_eq!(out.pixel(7, 7), Some(&green[..]));
        assert_eq!(out.pixel(7, 3), Some(&green[..]));
        assert_eq!(out.pixel(4, 5), Some(&[0u8, 0, 0][..]));
    }

    #[test]
    fn degenerate_rect_marks_origin() {
        let out = Annotator::new(StrokeColor::RED)
            .annotate(&blank(5, 5), &[Rectangle::degenerate()])
            .unwrap();
        assert_eq!(out.pixel(0, 0), Some(&[255u8, 0, 0][..]));
        let painted = out.as_bytes().chunks(3).filter(|px| px != &[0, 0, 0]).count();
        assert_eq!(painted, 1);
    }

    #[test]
    fn edge_rect_is_clipped() {
        let out = Annotator::new(StrokeColor::BLUE)
            .annotate(&blank(10, 10), &[Rectangle::new(5, 5, 5, 5)])
            .unwrap();
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.pixel(9, 5), Some(&[0u8, 0, 255][..]));
    }

    #[test]
    fn source_is_left_untouched() {
        let source = RasterBuffer::from_rgb_image(RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])));
        let _ = Annotator::new(StrokeColor::GREEN)
            .annotate(&source, &[Rectangle::new(1, 1, 3, 3)])
            .unwrap();
        assert!(source.as_bytes().iter().all(|&v| v == 9));
    }
}
