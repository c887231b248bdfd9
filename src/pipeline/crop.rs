//! Image crop: screenshot PNG → fixed-size slide PNG.
//!
//! Chrome's clipped capture can come back larger than the clip when the
//! device scale factor is not 1, or smaller when the page is shorter than the
//! slide. Cropping from the top-left to the slide size makes every slide in a
//! set the same size, which video editors expect when they tile them.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Crop a PNG to at most `width × height` from the top-left corner and
/// re-encode it as PNG.
///
/// An image already within bounds is re-encoded unchanged.
pub fn crop_to_slide(png: &[u8], width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(png)?;
    let w = width.min(img.width());
    let h = height.min(img.height());
    let cropped = img.crop_imm(0, 0, w, h);
    debug!(
        "Cropped {}x{} → {}x{}",
        img.width(),
        img.height(),
        cropped.width(),
        cropped.height()
    );
    encode_png(&cropped)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([20, 20, 20, 255])));
        encode_png(&img).expect("encode should succeed")
    }

    #[test]
    fn crops_oversized_capture() {
        let out = crop_to_slide(&png(532, 1440), 266, 720).expect("crop");
        let img = image::load_from_memory(&out).expect("valid png");
        assert_eq!((img.width(), img.height()), (266, 720));
    }

    #[test]
    fn keeps_smaller_capture() {
        let out = crop_to_slide(&png(100, 50), 266, 720).expect("crop");
        let img = image::load_from_memory(&out).expect("valid png");
        assert_eq!((img.width(), img.height()), (100, 50));
    }

    #[test]
    fn rejects_garbage() {
        assert!(crop_to_slide(b"not a png", 266, 720).is_err());
    }
}
