// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoding uploads into rasters and encoding pipeline output as JPEG.

use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, instrument};

use docpipe_core::error::{DocpipeError, Result};

use crate::raster::Raster;

/// Decode encoded image bytes (JPEG, PNG, TIFF, ...) into a raster.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode(data: &[u8]) -> Result<Raster> {
    let image = image::load_from_memory(data)
        .map_err(|err| DocpipeError::DecodeError(err.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DocpipeError::DecodeError("image has no pixels".into()));
    }
    debug!(width = image.width(), height = image.height(), "image decoded");
    Ok(Raster::from_dynamic(image))
}

/// Encode a raster as JPEG with the given quality (clamped to 1-100).
///
/// Single-channel rasters are written as-is; colour rasters have their
/// channel order reversed from BGR to the RGB layout the encoder expects.
#[instrument(skip(raster), fields(width = raster.width(), height = raster.height()))]
pub fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    let written = match raster {
        Raster::Luma(gray) => gray.write_with_encoder(encoder),
        Raster::Bgr(bgr) => {
            let rgb = crate::raster::reverse_channels(bgr.clone());
            rgb.write_with_encoder(encoder)
        }
    };
    written.map_err(|err| DocpipeError::Encode(format!("JPEG encoding failed: {err}")))?;
    debug!(bytes = buffer.len(), "raster encoded");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).expect("png encode");
        out.into_inner()
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode(b"definitely not an image").expect_err("should fail");
        assert!(matches!(err, DocpipeError::DecodeError(_)));
    }

    #[test]
    fn grayscale_encodes_as_grayscale_jpeg() {
        let gray = GrayImage::from_pixel(64, 64, Luma([180]));
        let raster = decode(&png_bytes(DynamicImage::ImageLuma8(gray))).expect("decode");
        let jpeg = encode_jpeg(&raster, 90).expect("encode");

        let back = image::load_from_memory(&jpeg).expect("valid jpeg");
        assert_eq!((back.width(), back.height()), (64, 64));
        assert!(!back.color().has_color());
    }

    #[test]
    fn colour_survives_the_channel_reversal() {
        let red = RgbImage::from_pixel(16, 16, Rgb([220, 20, 20]));
        let raster = decode(&png_bytes(DynamicImage::ImageRgb8(red))).expect("decode");
        let jpeg = encode_jpeg(&raster, 95).expect("encode");

        let back = image::load_from_memory(&jpeg).expect("valid jpeg").to_rgb8();
        let Rgb([r, _, b]) = *back.get_pixel(8, 8);
        assert!(r > 180, "red channel lost: {r}");
        assert!(b < 70, "blue channel gained: {b}");
    }
}
