use image::{ImageFormat, RgbaImage};
use lopdf::{dictionary, Stream};

use crate::PdfEngineError;

/// Pixel data split into the two image XObjects PDF needs for transparency.
pub(crate) struct ImageStreams {
    pub width: u32,
    pub height: u32,
    pub color: Stream,
    pub alpha: Stream,
}

pub(crate) fn decode_png(bytes: &[u8]) -> Result<RgbaImage, PdfEngineError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

/// Builds a DeviceRGB image and its DeviceGray soft mask, Flate-compressed.
/// The `SMask` reference is filled in by the caller once the mask has an id.
pub(crate) fn image_streams(image: &RgbaImage) -> Result<ImageStreams, PdfEngineError> {
    let (width, height) = image.dimensions();
    let pixel_count = (width as usize) * (height as usize);

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut alpha = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    );
    alpha.compress()?;

    let mut color = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb,
    );
    color.compress()?;

    Ok(ImageStreams { width, height, color, alpha })
}
