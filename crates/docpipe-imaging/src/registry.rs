// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Step registry: maps action step names to pure raster transformations.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::pipeline::{ActionPipelineParser, SUPPORTED_STEPS};

use crate::raster::Raster;
use crate::steps;

/// A single transformation. Must not touch any shared state.
pub type StepFn = Arc<dyn Fn(Raster) -> Result<Raster> + Send + Sync>;

/// Provider of image transformations, keyed by step name.
pub trait TransformationRegistry: Send + Sync {
    /// Every step name this registry can run, lowercase.
    fn step_names(&self) -> Vec<String>;

    /// Run `step` over `raster`.
    fn apply(&self, step: &str, raster: Raster) -> Result<Raster>;

    /// A parser that accepts exactly the steps of this registry.
    fn parser(&self) -> ActionPipelineParser {
        ActionPipelineParser::new(self.step_names())
    }
}

/// Registry backed by a name → function table.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: BTreeMap<String, StepFn>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StepRegistry {
    /// A registry with no steps.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in document cleanup steps.
    pub fn builtin() -> Self {
        Self::empty()
            .with_step("bleach", steps::bleach)
            .with_step("orientation", steps::orientation)
            .with_step("sharpen", steps::sharpen)
            .with_step("denoise", steps::denoise)
            .with_step("shadow", steps::shadow)
            .with_step("dewarp", steps::dewarp)
            .with_step("trim", steps::trim)
    }

    /// Register (or replace) a step. Names are stored lowercase.
    pub fn register<F>(&mut self, name: &str, step: F) -> &mut Self
    where
        F: Fn(Raster) -> Result<Raster> + Send + Sync + 'static,
    {
        self.steps.insert(name.to_ascii_lowercase(), Arc::new(step));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_step<F>(mut self, name: &str, step: F) -> Self
    where
        F: Fn(Raster) -> Result<Raster> + Send + Sync + 'static,
    {
        self.register(name, step);
        self
    }

    /// Check that the registry implements exactly the `declared` step set.
    ///
    /// Called once at startup so an action that parses can never reach a
    /// missing function, and a registered function is never unreachable.
    pub fn validate_against<I, S>(&self, declared: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let declared: Vec<String> = declared
            .into_iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .collect();
        let missing: Vec<&str> = declared
            .iter()
            .filter(|name| !self.steps.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        let undeclared: Vec<&str> = self
            .steps
            .keys()
            .filter(|name| !declared.contains(*name))
            .map(String::as_str)
            .collect();

        if missing.is_empty() && undeclared.is_empty() {
            info!(steps = declared.len(), "step registry validated");
            return Ok(());
        }
        Err(DocpipeError::InvalidInput(format!(
            "step registry mismatch: missing [{}], undeclared [{}]",
            missing.join(", "),
            undeclared.join(", ")
        )))
    }

    /// Validate against the default supported set.
    pub fn validate(&self) -> Result<()> {
        self.validate_against(SUPPORTED_STEPS)
    }
}

impl TransformationRegistry for StepRegistry {
    fn step_names(&self) -> Vec<String> {
        self.steps.keys().cloned().collect()
    }

    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    fn apply(&self, step: &str, raster: Raster) -> Result<Raster> {
        let f = self
            .steps
            .get(step)
            .ok_or_else(|| DocpipeError::step(step, "no transformation registered"))?;
        let out = f(raster)?;
        debug!(step, width = out.width(), height = out.height(), "step applied");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(w: u32, h: u32, v: u8) -> Raster {
        Raster::Luma(GrayImage::from_pixel(w, h, Luma([v])))
    }

    #[test]
    fn builtin_registry_matches_supported_steps() {
        StepRegistry::builtin().validate().expect("builtin registry is complete");
    }

    #[test]
    fn missing_and_undeclared_steps_are_both_reported() {
        let registry = StepRegistry::empty().with_step("invert", |raster| Ok(raster));
        let err = registry
            .validate_against(["invert", "bleach"])
            .expect_err("bleach is missing");
        assert!(err.to_string().contains("bleach"));

        let err = registry.validate_against(["bleach"]).expect_err("mismatch");
        let msg = err.to_string();
        assert!(msg.contains("missing [bleach]"));
        assert!(msg.contains("undeclared [invert]"));
    }

    #[test]
    fn unknown_step_is_a_processing_error() {
        let err = StepRegistry::empty()
            .apply("bleach", gray(4, 4, 0))
            .expect_err("nothing registered");
        assert!(matches!(err, DocpipeError::ProcessingError { ref step, .. } if step == "bleach"));
    }

    #[test]
    fn registered_steps_run_and_names_are_lowercased() {
        let mut registry = StepRegistry::empty();
        registry.register("Invert", |raster: Raster| {
            let mut plane = raster.to_luma();
            image::imageops::invert(&mut plane);
            Ok(Raster::Luma(plane))
        });
        assert_eq!(registry.step_names(), ["invert"]);
        let out = registry.apply("invert", gray(2, 2, 10)).expect("apply");
        assert_eq!(out.to_luma().get_pixel(0, 0).0[0], 245);
    }

    #[test]
    fn parser_follows_the_registry() {
        let registry = StepRegistry::empty().with_step("invert", |raster| Ok(raster));
        let parser = registry.parser();
        assert!(parser.parse("invert").is_ok());
        assert!(parser.parse("bleach").is_err());
    }
}
