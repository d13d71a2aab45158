// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in document cleanup steps: binarization, deskew, sharpening,
// denoising, shadow removal, page dewarping and trimming.
//
// Every step is a pure `Raster -> Raster` function. Steps that cannot find
// what they look for (no page edges, no skew, no content) return their input
// unchanged rather than failing.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{
    Interpolation, Projection, rotate_about_center, warp_into,
};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, info, instrument, warn};

use docpipe_core::error::Result;

use crate::raster::Raster;

// -- bleach -------------------------------------------------------------------

/// Half-width of the Sauvola window.
const SAUVOLA_RADIUS: u32 = 15;
/// Sensitivity to local contrast.
const SAUVOLA_K: f64 = 0.2;
/// Dynamic range of the standard deviation.
const SAUVOLA_R: f64 = 128.0;

/// Sauvola binarization: each pixel is compared against a threshold derived
/// from the mean and standard deviation of its neighbourhood, so uneven
/// lighting does not swallow faint strokes. Always yields a single channel.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn bleach(raster: Raster) -> Result<Raster> {
    let gray = raster.to_luma();
    let (width, height) = gray.dimensions();
    let tables = IntegralTables::new(&gray);

    let output = GrayImage::from_fn(width, height, |x, y| {
        let (mean, std_dev) = tables.window_stats(x, y, SAUVOLA_RADIUS);
        let threshold = mean * (1.0 + SAUVOLA_K * (std_dev / SAUVOLA_R - 1.0));
        let value = gray.get_pixel(x, y).0[0] as f64;
        Luma([if value <= threshold { 0 } else { 255 }])
    });

    debug!("sauvola binarization complete");
    Ok(Raster::Luma(output))
}

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables are `(width+1) x (height+1)` with a zero border, so
/// `sum[y * stride + x]` is the sum over `[0, x) x [0, y)`.
struct IntegralTables {
    width: u32,
    height: u32,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralTables {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = (width + 1) as usize;
        let mut sum = vec![0u64; stride * (height + 1) as usize];
        let mut sq_sum = vec![0u64; stride * (height + 1) as usize];

        for y in 0..height {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width {
                let v = gray.get_pixel(x, y).0[0] as u64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                sum[idx] = row + sum[above];
                sq_sum[idx] = row_sq + sq_sum[above];
            }
        }

        Self {
            width,
            height,
            sum,
            sq_sum,
        }
    }

    /// Mean and standard deviation of the square window centred on (cx, cy),
    /// clamped to the image.
    fn window_stats(&self, cx: u32, cy: u32, radius: u32) -> (f64, f64) {
        let stride = (self.width + 1) as usize;
        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = ((cx + radius + 1) as usize).min(self.width as usize);
        let y2 = ((cy + radius + 1) as usize).min(self.height as usize);

        let area = ((x2 - x1) * (y2 - y1)) as f64;
        if area == 0.0 {
            return (128.0, 0.0);
        }

        let rect = |table: &[u64]| {
            table[y2 * stride + x2] as f64 - table[y1 * stride + x2] as f64
                - table[y2 * stride + x1] as f64
                + table[y1 * stride + x1] as f64
        };
        let mean = rect(&self.sum) / area;
        let variance = (rect(&self.sq_sum) / area - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

// -- orientation --------------------------------------------------------------

/// Largest skew corrected, in either direction.
const MAX_SKEW_DEGREES: f32 = 30.0;
/// Resolution of the skew search.
const SKEW_STEP_DEGREES: f32 = 0.5;
/// Skew is estimated on a copy no larger than this on its longest side.
const ANALYSIS_MAX_SIDE: u32 = 400;

/// Deskew: estimate the text-line angle within ±30° and rotate the page
/// level. The canvas keeps its size; uncovered corners are filled white.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn orientation(raster: Raster) -> Result<Raster> {
    let angle = estimate_skew(&raster.to_luma());
    if angle.abs() < SKEW_STEP_DEGREES {
        debug!("page already level");
        return Ok(raster);
    }

    info!(angle, "correcting skew");
    let theta = angle.to_radians();
    Ok(match raster {
        Raster::Luma(gray) => Raster::Luma(rotate_about_center(
            &gray,
            theta,
            Interpolation::Bilinear,
            Luma([255u8]),
        )),
        Raster::Bgr(bgr) => Raster::Bgr(rotate_about_center(
            &bgr,
            theta,
            Interpolation::Bilinear,
            Rgb([255u8, 255, 255]),
        )),
    })
}

/// Find the clockwise rotation (degrees) that makes text lines horizontal.
///
/// Ink pixels are projected onto the vertical axis for every candidate angle;
/// the angle whose row histogram is most concentrated wins. Candidates are
/// visited nearest-to-zero first so ties resolve to the smallest correction.
pub(crate) fn estimate_skew(gray: &GrayImage) -> f32 {
    let small = downscale(gray, ANALYSIS_MAX_SIDE);
    let level = otsu_level(&small);
    let ink: Vec<(f32, f32)> = small
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] <= level)
        .map(|(x, y, _)| (x as f32, y as f32))
        .collect();

    let total = small.width() as usize * small.height() as usize;
    if ink.len() < 16 || ink.len() * 2 > total {
        debug!(ink = ink.len(), total, "not enough contrast to estimate skew");
        return 0.0;
    }

    let (w, h) = small.dimensions();
    let diag = (w as f32).hypot(h as f32).ceil() as usize;
    let mut bins = vec![0u32; 2 * diag + 1];
    let steps = (MAX_SKEW_DEGREES / SKEW_STEP_DEGREES) as i32;

    let mut best_angle = 0.0f32;
    let mut best_score = f64::MIN;
    let candidates = (0..=steps).flat_map(|i| if i == 0 { vec![0] } else { vec![-i, i] });
    for i in candidates {
        let angle = i as f32 * SKEW_STEP_DEGREES;
        let (sin, cos) = angle.to_radians().sin_cos();
        bins.iter_mut().for_each(|b| *b = 0);
        for &(x, y) in &ink {
            let row = (x * sin + y * cos).round() as i64 + diag as i64;
            if let Some(bin) = usize::try_from(row).ok().and_then(|r| bins.get_mut(r)) {
                *bin += 1;
            }
        }
        let score: f64 = bins.iter().map(|&c| (c as f64) * (c as f64)).sum();
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    debug!(angle = best_angle, "skew estimated");
    best_angle
}

// -- sharpen ------------------------------------------------------------------

/// Unsharp mask followed by a mild contrast boost, per channel.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn sharpen(raster: Raster) -> Result<Raster> {
    Ok(raster.map_planes(|plane| {
        let blurred = gaussian_blur_f32(plane, 1.5);
        let sharpened = GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
            let p = plane.get_pixel(x, y).0[0] as f32;
            let b = blurred.get_pixel(x, y).0[0] as f32;
            Luma([(1.6 * p - 0.6 * b).round().clamp(0.0, 255.0) as u8])
        });
        adjust_contrast(&sharpened, 1.15)
    }))
}

/// Scale each value's distance from mid-grey by `factor`.
fn adjust_contrast(plane: &GrayImage, factor: f32) -> GrayImage {
    GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
        let v = plane.get_pixel(x, y).0[0] as f32;
        Luma([(factor * (v - 128.0) + 128.0).clamp(0.0, 255.0) as u8])
    })
}

// -- denoise ------------------------------------------------------------------

/// 3x3 median filter to drop speckles, then push near-white paper to pure
/// white so scanner noise in the background disappears.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn denoise(raster: Raster) -> Result<Raster> {
    let level = otsu_level(&raster.to_luma()) as f32;
    let paper = level + (255.0 - level) * 0.5;

    let filtered = match raster {
        Raster::Luma(gray) => Raster::Luma(median_filter(&gray, 1, 1)),
        Raster::Bgr(bgr) => Raster::Bgr(median_filter(&bgr, 1, 1)),
    };
    let luma = filtered.to_luma();
    let is_paper = |x: u32, y: u32| luma.get_pixel(x, y).0[0] as f32 > paper;

    Ok(match filtered {
        Raster::Luma(mut gray) => {
            for (x, y, p) in gray.enumerate_pixels_mut() {
                if is_paper(x, y) {
                    *p = Luma([255]);
                }
            }
            Raster::Luma(gray)
        }
        Raster::Bgr(mut bgr) => {
            for (x, y, p) in bgr.enumerate_pixels_mut() {
                if is_paper(x, y) {
                    *p = Rgb([255, 255, 255]);
                }
            }
            Raster::Bgr(bgr)
        }
    })
}

// -- shadow -------------------------------------------------------------------

/// Background is estimated on a copy no larger than this.
const SHADOW_ANALYSIS_SIDE: u32 = 256;
/// Dilation radius (at analysis scale) that erases text from the background.
const SHADOW_DILATE_RADIUS: u32 = 3;

/// Divide every channel by an estimate of the paper's illumination, which
/// flattens cast shadows and lighting gradients.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn shadow(raster: Raster) -> Result<Raster> {
    Ok(raster.map_planes(flatten_illumination))
}

fn flatten_illumination(plane: &GrayImage) -> GrayImage {
    let (w, h) = plane.dimensions();
    let small = downscale(plane, SHADOW_ANALYSIS_SIDE);
    let background = gaussian_blur_f32(&max_filter(&small, SHADOW_DILATE_RADIUS), 2.0);
    let background = imageops::resize(&background, w, h, FilterType::Triangle);

    GrayImage::from_fn(w, h, |x, y| {
        let v = plane.get_pixel(x, y).0[0] as f32;
        let bg = background.get_pixel(x, y).0[0].max(1) as f32;
        Luma([(v * 255.0 / bg).round().min(255.0) as u8])
    })
}

/// Separable grayscale dilation with a square window.
fn max_filter(plane: &GrayImage, radius: u32) -> GrayImage {
    let (w, h) = plane.dimensions();
    let horizontal = GrayImage::from_fn(w, h, |x, y| {
        let lo = x.saturating_sub(radius);
        let hi = (x + radius).min(w - 1);
        let max = (lo..=hi).map(|i| plane.get_pixel(i, y).0[0]).max().unwrap_or(0);
        Luma([max])
    });
    GrayImage::from_fn(w, h, |x, y| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(h - 1);
        let max = (lo..=hi).map(|j| horizontal.get_pixel(x, j).0[0]).max().unwrap_or(0);
        Luma([max])
    })
}

// -- dewarp -------------------------------------------------------------------

/// Detect the page outline and warp it onto the full canvas.
///
/// ## Pipeline
///
/// 1. Gaussian blur (sigma 2.0) of the luminance plane
/// 2. Canny edge detection
/// 3. Hough line detection
/// 4. Split lines into roughly horizontal and roughly vertical
/// 5. Take the outermost line on each side
/// 6. Intersect them into four corners
/// 7. Projective warp of the quadrilateral onto the original canvas size
///
/// When no convincing quadrilateral is found the input is returned as-is.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn dewarp(raster: Raster) -> Result<Raster> {
    let (w, h) = raster.dimensions();
    let Some(corners) = find_page_quad(&raster.to_luma()) else {
        return Ok(raster);
    };

    let dest = [
        (0.0, 0.0),
        (w as f32, 0.0),
        (w as f32, h as f32),
        (0.0, h as f32),
    ];
    let Some(projection) = Projection::from_control_points(corners, dest) else {
        warn!("degenerate page quadrilateral; leaving image unchanged");
        return Ok(raster);
    };

    info!(?corners, "page dewarped");
    Ok(match raster {
        Raster::Luma(gray) => {
            let mut out = GrayImage::new(w, h);
            warp_into(&gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
            Raster::Luma(out)
        }
        Raster::Bgr(bgr) => {
            let mut out = RgbImage::new(w, h);
            warp_into(
                &bgr,
                &projection,
                Interpolation::Bilinear,
                Rgb([255u8, 255, 255]),
                &mut out,
            );
            Raster::Bgr(out)
        }
    })
}

/// Corners `[top_left, top_right, bottom_right, bottom_left]` of the page.
fn find_page_quad(gray: &GrayImage) -> Option<[(f32, f32); 4]> {
    let (w, h) = gray.dimensions();
    let edges = canny(&gaussian_blur_f32(gray, 2.0), 50.0, 150.0);

    // Votes scale with resolution; suppression avoids near-duplicates.
    let diagonal = (w as f32).hypot(h as f32);
    let options = LineDetectionOptions {
        vote_threshold: (diagonal * 0.25).max(80.0) as u32,
        suppression_radius: 8,
    };
    let lines = detect_lines(&edges, options);
    if lines.len() < 4 {
        debug!(lines = lines.len(), "too few lines for page detection");
        return None;
    }

    let (horizontal, vertical) = split_lines(&lines, w as f32 / 2.0, h as f32 / 2.0);
    if horizontal.len() < 2 || vertical.len() < 2 {
        debug!(
            horizontal = horizontal.len(),
            vertical = vertical.len(),
            "not enough page edges"
        );
        return None;
    }
    let top = horizontal.iter().min_by(|a, b| a.0.total_cmp(&b.0))?.1;
    let bottom = horizontal.iter().max_by(|a, b| a.0.total_cmp(&b.0))?.1;
    let left = vertical.iter().min_by(|a, b| a.0.total_cmp(&b.0))?.1;
    let right = vertical.iter().max_by(|a, b| a.0.total_cmp(&b.0))?.1;

    let corners = [
        intersect(&top, &left)?,
        intersect(&top, &right)?,
        intersect(&bottom, &right)?,
        intersect(&bottom, &left)?,
    ];

    let slack_x = w as f32 * 0.05;
    let slack_y = h as f32 * 0.05;
    let inside = corners.iter().all(|&(x, y)| {
        (-slack_x..=w as f32 + slack_x).contains(&x) && (-slack_y..=h as f32 + slack_y).contains(&y)
    });
    if !inside {
        debug!(?corners, "page corners fall outside the image");
        return None;
    }

    // Reject spurious micro-rectangles.
    let area = shoelace_area(&corners);
    if area < w as f32 * h as f32 * 0.10 {
        debug!(area, "page quadrilateral too small");
        return None;
    }
    Some(corners)
}

/// Split Hough lines into horizontal and vertical sets, each tagged with its
/// position across the image centre (y for horizontals, x for verticals).
///
/// A `PolarLine` is `x cos θ + y sin θ = r`; θ near 90° is horizontal,
/// θ near 0° or 180° is vertical. Diagonal lines are discarded.
fn split_lines(
    lines: &[PolarLine],
    x_mid: f32,
    y_mid: f32,
) -> (Vec<(f32, PolarLine)>, Vec<(f32, PolarLine)>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for line in lines {
        let (sin, cos) = (line.angle_in_degrees as f32).to_radians().sin_cos();
        match line.angle_in_degrees {
            60..=120 => horizontal.push(((line.r - x_mid * cos) / sin, *line)),
            0..=30 | 150..=180 => vertical.push(((line.r - y_mid * sin) / cos, *line)),
            _ => {}
        }
    }
    (horizontal, vertical)
}

/// Intersection of two polar lines, or `None` when (nearly) parallel.
fn intersect(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let (sin_a, cos_a) = (a.angle_in_degrees as f64).to_radians().sin_cos();
    let (sin_b, cos_b) = (b.angle_in_degrees as f64).to_radians().sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (a.r as f64, b.r as f64);
    let x = (r_a * sin_b - r_b * sin_a) / denom;
    let y = (r_b * cos_a - r_a * cos_b) / denom;
    Some((x as f32, y as f32))
}

fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let mut area = 0.0f32;
    for i in 0..corners.len() {
        let j = (i + 1) % corners.len();
        area += corners[i].0 * corners[j].1 - corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

// -- trim ---------------------------------------------------------------------

/// Luminance difference from the border tone that counts as content.
const TRIM_TOLERANCE: i16 = 40;
/// Margin kept around the content, as a fraction of the longest side.
const TRIM_MARGIN: f32 = 0.02;

/// Crop away the uniform border around the document and stretch its levels.
/// The result is always a colour raster.
#[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
pub fn trim(raster: Raster) -> Result<Raster> {
    let luma = raster.to_luma();
    let bgr = raster.into_bgr();
    let (w, h) = bgr.dimensions();

    let (x, y, cw, ch) = content_bounds(&luma).unwrap_or((0, 0, w, h));
    debug!(x, y, cw, ch, "content bounds");
    let cropped = imageops::crop_imm(&bgr, x, y, cw, ch).to_image();
    let cropped_luma = imageops::crop_imm(&luma, x, y, cw, ch).to_image();

    let Some((lo, hi)) = level_range(&cropped_luma) else {
        return Ok(Raster::Bgr(cropped));
    };
    let span = (hi - lo) as f32;
    Ok(Raster::Bgr(cropped).map_planes(|plane| {
        GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
            let v = plane.get_pixel(x, y).0[0] as f32;
            Luma([((v - lo as f32) * 255.0 / span).round().clamp(0.0, 255.0) as u8])
        })
    }))
}

/// Bounding box `(x, y, width, height)` of everything that differs from the
/// median border tone, padded by the trim margin.
fn content_bounds(luma: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = luma.dimensions();
    let mut border: Vec<u8> = luma
        .enumerate_pixels()
        .filter(|(x, y, _)| *x == 0 || *y == 0 || *x == w - 1 || *y == h - 1)
        .map(|(_, _, p)| p.0[0])
        .collect();
    border.sort_unstable();
    let background = *border.get(border.len() / 2)? as i16;

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in luma.enumerate_pixels() {
        if (p.0[0] as i16 - background).abs() > TRIM_TOLERANCE {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    let (x0, y0, x1, y1) = bounds?;

    let margin = (w.max(h) as f32 * TRIM_MARGIN) as u32;
    let x0 = x0.saturating_sub(margin);
    let y0 = y0.saturating_sub(margin);
    let x1 = (x1 + margin).min(w - 1);
    let y1 = (y1 + margin).min(h - 1);
    Some((x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// 1st and 99th percentile of the luminance histogram, or `None` when the
/// image is too flat to stretch.
fn level_range(luma: &GrayImage) -> Option<(u8, u8)> {
    let mut histogram = [0u64; 256];
    for p in luma.pixels() {
        histogram[p.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let percentile = |fraction: f64| {
        let target = (total as f64 * fraction).ceil() as u64;
        let mut seen = 0u64;
        for (value, &count) in histogram.iter().enumerate() {
            seen += count;
            if seen >= target.max(1) {
                return value as u8;
            }
        }
        255
    };
    let (lo, hi) = (percentile(0.01), percentile(0.99));
    (hi.saturating_sub(lo) >= 16).then_some((lo, hi))
}

// -- shared helpers -----------------------------------------------------------

/// Shrink so the longest side is at most `max_side`, keeping aspect ratio.
fn downscale(gray: &GrayImage, max_side: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return gray.clone();
    }
    let scale = max_side as f32 / longest as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(gray, nw, nh, FilterType::Triangle)
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_block(w: u32, h: u32, block: (u32, u32, u32, u32)) -> GrayImage {
        let (bx, by, bw, bh) = block;
        GrayImage::from_fn(w, h, |x, y| {
            let inside = (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y);
            Luma([if inside { 20 } else { 235 }])
        })
    }

    #[test]
    fn bleach_produces_pure_black_and_white() {
        let gray = page_with_block(64, 64, (20, 20, 10, 24));
        let out = bleach(Raster::Luma(gray)).expect("bleach");
        let Raster::Luma(out) = out else {
            panic!("bleach must return a single channel");
        };
        assert_eq!(out.dimensions(), (64, 64));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(25, 30).0[0], 0, "ink stays black");
        assert_eq!(out.get_pixel(2, 2).0[0], 255, "paper turns white");
    }

    #[test]
    fn bleach_accepts_colour_input() {
        let bgr = RgbImage::from_pixel(32, 16, Rgb([200, 210, 220]));
        let out = bleach(Raster::Bgr(bgr)).expect("bleach");
        assert_eq!(out.channels(), 1);
        assert_eq!(out.dimensions(), (32, 16));
    }

    #[test]
    fn skew_of_level_text_is_zero() {
        let mut gray = GrayImage::from_pixel(200, 200, Luma([255]));
        for line in 0..8 {
            let y = 30 + line * 20;
            for x in 10..190 {
                gray.put_pixel(x, y, Luma([0]));
                gray.put_pixel(x, y + 1, Luma([0]));
            }
        }
        assert_eq!(estimate_skew(&gray), 0.0);
    }

    #[test]
    fn skew_of_tilted_text_is_found() {
        let slope = 5.0f32.to_radians().tan();
        let mut gray = GrayImage::from_pixel(200, 200, Luma([255]));
        for line in 0..8 {
            let y0 = 30.0 + line as f32 * 20.0;
            for x in 0..200u32 {
                let y = (y0 + x as f32 * slope).round() as u32;
                gray.put_pixel(x, y, Luma([0]));
                gray.put_pixel(x, y + 1, Luma([0]));
            }
        }
        let angle = estimate_skew(&gray);
        assert!((angle + 5.0).abs() <= 1.0, "expected about -5 degrees, got {angle}");
    }

    #[test]
    fn orientation_keeps_canvas_size() {
        let gray = page_with_block(80, 60, (10, 10, 50, 4));
        let out = orientation(Raster::Luma(gray)).expect("orientation");
        assert_eq!(out.dimensions(), (80, 60));
    }

    #[test]
    fn sharpen_preserves_shape_and_channels() {
        let bgr = RgbImage::from_fn(40, 30, |x, _| Rgb([(x * 6) as u8, 100, 200]));
        let out = sharpen(Raster::Bgr(bgr)).expect("sharpen");
        assert_eq!(out.dimensions(), (40, 30));
        assert_eq!(out.channels(), 3);
    }

    #[test]
    fn denoise_removes_isolated_specks() {
        let mut gray = GrayImage::from_pixel(32, 32, Luma([240]));
        gray.put_pixel(16, 16, Luma([0]));
        let out = denoise(Raster::Luma(gray)).expect("denoise");
        assert!(out.to_luma().get_pixel(16, 16).0[0] >= 240, "speck survived");
    }

    #[test]
    fn shadow_flattens_a_lighting_gradient() {
        let gray = GrayImage::from_fn(120, 80, |x, _| Luma([(100 + x) as u8]));
        let out = shadow(Raster::Luma(gray)).expect("shadow").to_luma();
        let mean = out.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (120.0 * 80.0);
        assert!(mean > 230.0, "background should be near white, mean {mean}");
    }

    #[test]
    fn dewarp_blank_page_is_unchanged() {
        let gray = GrayImage::from_pixel(200, 300, Luma([200]));
        let raster = Raster::Luma(gray);
        let out = dewarp(raster.clone()).expect("dewarp");
        assert_eq!(out, raster);
    }

    #[test]
    fn dewarp_synthetic_page_keeps_canvas() {
        let gray = page_with_block(400, 500, (50, 60, 300, 380));
        let out = dewarp(Raster::Luma(gray)).expect("dewarp");
        assert_eq!(out.dimensions(), (400, 500));
    }

    #[test]
    fn trim_crops_to_content_and_returns_colour() {
        let gray = page_with_block(100, 80, (30, 20, 30, 30));
        let out = trim(Raster::Luma(gray)).expect("trim");
        assert_eq!(out.channels(), 3);
        let (w, h) = out.dimensions();
        assert!((30..=40).contains(&w), "width {w}");
        assert!((30..=40).contains(&h), "height {h}");
    }

    #[test]
    fn trim_of_blank_page_keeps_everything() {
        let gray = GrayImage::from_pixel(50, 40, Luma([128]));
        let out = trim(Raster::Luma(gray)).expect("trim");
        assert_eq!(out.dimensions(), (50, 40));
    }

    #[test]
    fn polar_lines_intersect() {
        let horizontal = PolarLine { r: 100.0, angle_in_degrees: 90 };
        let vertical = PolarLine { r: 50.0, angle_in_degrees: 0 };
        let (x, y) = intersect(&horizontal, &vertical).expect("should intersect");
        assert!((x - 50.0).abs() < 0.5 && (y - 100.0).abs() < 0.5);
        assert!(intersect(&vertical, &PolarLine { r: 80.0, angle_in_degrees: 0 }).is_none());
    }

    #[test]
    fn lines_split_by_orientation() {
        let lines = [
            PolarLine { r: 10.0, angle_in_degrees: 90 },
            PolarLine { r: 20.0, angle_in_degrees: 88 },
            PolarLine { r: 30.0, angle_in_degrees: 0 },
            PolarLine { r: -40.0, angle_in_degrees: 175 },
            PolarLine { r: 50.0, angle_in_degrees: 45 },
        ];
        let (horizontal, vertical) = split_lines(&lines, 50.0, 50.0);
        assert_eq!(horizontal.len(), 2);
        assert_eq!(vertical.len(), 2);
        assert!((horizontal[0].0 - 10.0).abs() < 1e-3);
    }

    #[test]
    fn shoelace_area_of_rectangle() {
        let area = shoelace_area(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]);
        assert!((area - 50.0).abs() < 1e-3);
    }
}
