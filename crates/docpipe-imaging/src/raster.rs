// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory raster passed between pipeline steps.
//
// Colour rasters are kept in blue-green-red channel order, the native order
// of the transformation registry. The codec reverses the channels at the
// encode/decode boundary; steps never see RGB.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// A decoded image flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
    /// Single channel.
    Luma(GrayImage),
    /// Three channels stored as `[b, g, r]` (an `RgbImage` buffer reused for
    /// its layout only).
    Bgr(RgbImage),
}

impl Raster {
    /// Convert a decoded image into registry order. Alpha is dropped.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        if image.color().has_color() {
            Self::Bgr(reverse_channels(image.to_rgb8()))
        } else {
            Self::Luma(image.to_luma8())
        }
    }

    /// Build a colour raster from an RGB buffer.
    pub fn from_rgb(image: RgbImage) -> Self {
        Self::Bgr(reverse_channels(image))
    }

    /// Convert back to an encoder-ready image (RGB order for colour).
    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Self::Luma(gray) => DynamicImage::ImageLuma8(gray),
            Self::Bgr(bgr) => DynamicImage::ImageRgb8(reverse_channels(bgr)),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Luma(gray) => gray.dimensions(),
            Self::Bgr(bgr) => bgr.dimensions(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Self::Luma(_) => 1,
            Self::Bgr(_) => 3,
        }
    }

    /// Luminance plane (ITU-R BT.601 weights).
    pub fn to_luma(&self) -> GrayImage {
        match self {
            Self::Luma(gray) => gray.clone(),
            Self::Bgr(bgr) => GrayImage::from_fn(bgr.width(), bgr.height(), |x, y| {
                let Rgb([b, g, r]) = *bgr.get_pixel(x, y);
                let luma = 0.114 * b as f32 + 0.587 * g as f32 + 0.299 * r as f32;
                Luma([luma.round().clamp(0.0, 255.0) as u8])
            }),
        }
    }

    /// Colour view, replicating a single channel when needed.
    pub fn into_bgr(self) -> RgbImage {
        match self {
            Self::Bgr(bgr) => bgr,
            Self::Luma(gray) => RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
                let v = gray.get_pixel(x, y).0[0];
                Rgb([v, v, v])
            }),
        }
    }

    /// Apply `f` to every channel plane independently.
    pub fn map_planes(self, f: impl Fn(&GrayImage) -> GrayImage) -> Self {
        match self {
            Self::Luma(gray) => Self::Luma(f(&gray)),
            Self::Bgr(bgr) => {
                let planes = split_planes(&bgr).map(|plane| f(&plane));
                Self::Bgr(merge_planes(&planes))
            }
        }
    }
}

/// Swap the first and third channel of every pixel (RGB ⇄ BGR).
pub fn reverse_channels(mut image: RgbImage) -> RgbImage {
    for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    image
}

fn split_planes(image: &RgbImage) -> [GrayImage; 3] {
    let (w, h) = image.dimensions();
    [0usize, 1, 2].map(|c| GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y).0[c]])))
}

fn merge_planes(planes: &[GrayImage; 3]) -> RgbImage {
    let (w, h) = planes[0].dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            planes[0].get_pixel(x, y).0[0],
            planes[1].get_pixel(x, y).0[0],
            planes[2].get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_images_are_held_in_bgr_order() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([200, 10, 30]));
        let raster = Raster::from_dynamic(DynamicImage::ImageRgb8(rgb));
        match &raster {
            Raster::Bgr(bgr) => assert_eq!(bgr.get_pixel(0, 0).0, [30, 10, 200]),
            Raster::Luma(_) => panic!("expected a colour raster"),
        }
        let back = raster.into_dynamic().to_rgb8();
        assert_eq!(back.get_pixel(1, 1).0, [200, 10, 30]);
    }

    #[test]
    fn grayscale_stays_single_channel() {
        let gray = GrayImage::from_pixel(3, 5, Luma([77]));
        let raster = Raster::from_dynamic(DynamicImage::ImageLuma8(gray));
        assert_eq!(raster.channels(), 1);
        assert_eq!(raster.dimensions(), (3, 5));
    }

    #[test]
    fn luma_uses_bgr_weights() {
        // Pure red in BGR order is [0, 0, 255].
        let raster = Raster::Bgr(RgbImage::from_pixel(1, 1, Rgb([0, 0, 255])));
        assert_eq!(raster.to_luma().get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn map_planes_touches_each_channel() {
        let raster = Raster::Bgr(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let doubled = raster.map_planes(|plane| {
            GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
                Luma([plane.get_pixel(x, y).0[0] * 2])
            })
        });
        assert_eq!(doubled.into_bgr().get_pixel(0, 0).0, [2, 4, 6]);
    }
}
