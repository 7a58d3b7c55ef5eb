use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};

use crate::{
    error::{RecognitionError, Result},
    raster::{PlaneLayout, RasterBuffer},
};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decode any supported container into an RGB buffer
pub fn decode(bytes: &[u8]) -> Result<RasterBuffer> {
    let image = image::load_from_memory(bytes).map_err(RecognitionError::Decode)?;
    Ok(RasterBuffer::from_dynamic(&image))
}

/// Serialize an RGB or gray buffer as baseline JPEG
pub fn encode_jpeg(buffer: &RasterBuffer, quality: u8) -> Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(RecognitionError::InvalidParameter(format!(
            "JPEG quality must be within 1-100, got {quality}"
        )));
    }

    let color = match buffer.layout() {
        PlaneLayout::Rgb => ExtendedColorType::Rgb8,
        PlaneLayout::Gray => ExtendedColorType::L8,
        other => {
            return Err(RecognitionError::Encode(format!(
                "{other:?} buffers cannot be written as JPEG"
            )));
        }
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .write_image(buffer.as_bytes(), buffer.width(), buffer.height(), color)
        .map_err(|e| RecognitionError::Encode(e.to_string()))?;
    Ok(bytes)
}
