// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the built-in cleanup steps on a synthetic page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use docpipe_core::ActionPipelineParser;
use docpipe_imaging::{Raster, StepRegistry, TransformationRegistry};

/// 400x300 light page with a few dark "text lines" and a darker frame.
fn synthetic_page() -> Raster {
    let (width, height) = (400u32, 300u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([40u8]));
    for y in 20..280 {
        for x in 20..380 {
            img.put_pixel(x, y, Luma([225u8]));
        }
    }
    for line in 0..10 {
        let y = 40 + line * 22;
        for x in 40..360 {
            img.put_pixel(x, y, Luma([15u8]));
            img.put_pixel(x, y + 1, Luma([15u8]));
        }
    }
    Raster::Luma(img)
}

fn bench_single_steps(c: &mut Criterion) {
    let registry = StepRegistry::builtin();
    let page = synthetic_page();

    for step in ["bleach", "orientation", "sharpen", "denoise", "shadow", "dewarp", "trim"] {
        c.bench_function(&format!("{step} (400x300)"), |b| {
            b.iter(|| {
                let out = registry.apply(step, black_box(page.clone()));
                black_box(out.ok());
            });
        });
    }
}

fn bench_full_pipeline(c: &mut Criterion) {
    let registry = StepRegistry::builtin();
    let pipeline = ActionPipelineParser::default()
        .parse("dewarp|orientation|shadow|denoise|sharpen|bleach")
        .expect("valid action");
    let page = synthetic_page();

    c.bench_function("cleanup pipeline (400x300)", |b| {
        b.iter(|| {
            let mut raster = black_box(page.clone());
            for step in pipeline.steps() {
                raster = match registry.apply(step, raster) {
                    Ok(next) => next,
                    Err(_) => return,
                };
            }
            black_box(raster);
        });
    });
}

criterion_group!(benches, bench_single_steps, bench_full_pipeline);
criterion_main!(benches);
