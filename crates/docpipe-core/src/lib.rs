// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docpipe: Core types, errors, configuration and action parsing shared
// across all crates.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::{ServiceConfig, StorageBackend};
pub use error::{DocpipeError, ErrorKind, Result};
pub use pipeline::{ActionPipeline, ActionPipelineParser, SUPPORTED_STEPS};
pub use types::*;
