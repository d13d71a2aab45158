// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docpipe-imaging: Rasters, codecs and the document cleanup steps.
//
// Uploads are decoded into a `Raster`, threaded through the steps named by an
// action pipeline, and encoded back out as JPEG. Steps are looked up through a
// `TransformationRegistry` so callers can swap in their own set.

pub mod codec;
pub mod raster;
pub mod registry;
pub mod steps;

pub use codec::{decode, encode_jpeg};
pub use raster::Raster;
pub use registry::{StepFn, StepRegistry, TransformationRegistry};
