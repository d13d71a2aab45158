// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docpipe-service: Job execution and the service facade.

pub mod data_dir;
pub mod executor;
pub mod service;

pub use executor::{JobExecutor, run_pipeline};
pub use service::{DocumentService, Submission};
