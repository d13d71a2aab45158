// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action pipeline parsing: `"trim | orientation, bleach"` → ordered step list.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::error::{DocpipeError, Result};

/// Steps understood by the built-in transformation registry.
pub const SUPPORTED_STEPS: [&str; 7] = [
    "bleach",
    "orientation",
    "sharpen",
    "denoise",
    "shadow",
    "dewarp",
    "trim",
];

/// Ordered, validated list of step names. Repeats are kept; each step
/// consumes the previous step's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPipeline {
    steps: Vec<String>,
}

impl ActionPipeline {
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Canonical `step|step|...` form, as stored in job metadata.
    pub fn as_action_string(&self) -> String {
        self.steps.join("|")
    }
}

impl fmt::Display for ActionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_action_string())
    }
}

/// Validates raw action strings against a fixed set of step names.
#[derive(Debug, Clone)]
pub struct ActionPipelineParser {
    supported: BTreeSet<String>,
}

impl Default for ActionPipelineParser {
    fn default() -> Self {
        Self::new(SUPPORTED_STEPS)
    }
}

impl ActionPipelineParser {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            supported: supported
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Recognised step names, sorted.
    pub fn supported(&self) -> impl Iterator<Item = &str> {
        self.supported.iter().map(String::as_str)
    }

    pub fn supports(&self, step: &str) -> bool {
        self.supported.contains(step)
    }

    /// Parse `raw` into an ordered pipeline.
    ///
    /// Tokens are split on `|` or `,`, trimmed, lowercased; empty tokens are
    /// dropped. Every unrecognised token is reported in a single error.
    pub fn parse(&self, raw: &str) -> Result<ActionPipeline> {
        let steps: Vec<String> = raw
            .split(['|', ','])
            .map(|token| token.trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        if steps.is_empty() {
            return Err(DocpipeError::InvalidInput("no action specified".into()));
        }

        let unknown: Vec<&str> = steps
            .iter()
            .map(String::as_str)
            .filter(|step| !self.supports(step))
            .collect();
        if !unknown.is_empty() {
            return Err(DocpipeError::InvalidInput(format!(
                "unknown action(s): {}",
                unknown.join(", ")
            )));
        }

        debug!(steps = steps.len(), "action pipeline parsed");
        Ok(ActionPipeline { steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Vec<String>> {
        ActionPipelineParser::default()
            .parse(raw)
            .map(|p| p.steps().to_vec())
    }

    #[test]
    fn keeps_input_order() {
        assert_eq!(
            parse("trim|orientation|bleach").expect("parse"),
            ["trim", "orientation", "bleach"]
        );
    }

    #[test]
    fn mixed_delimiters_case_and_whitespace() {
        assert_eq!(parse("Sharpen, BLEACH").expect("parse"), ["sharpen", "bleach"]);
        assert_eq!(
            parse(" shadow |dewarp,, | trim ").expect("parse"),
            ["shadow", "dewarp", "trim"]
        );
    }

    #[test]
    fn repeats_are_preserved() {
        assert_eq!(
            parse("sharpen|bleach|sharpen").expect("parse"),
            ["sharpen", "bleach", "sharpen"]
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        for raw in ["", "   ", "|", " , | "] {
            assert!(matches!(parse(raw), Err(DocpipeError::InvalidInput(_))));
        }
    }

    #[test]
    fn unknown_step_is_named() {
        let err = parse("trim|frobnicate").expect_err("should fail");
        assert!(matches!(err, DocpipeError::InvalidInput(_)));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn every_unknown_step_is_reported_at_once() {
        let err = parse("blur|trim|Rotate|bleach|warp").expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("blur"));
        assert!(msg.contains("rotate"));
        assert!(msg.contains("warp"));
        assert!(!msg.contains("trim"));
    }

    #[test]
    fn custom_step_sets_are_honoured() {
        let parser = ActionPipelineParser::new(["invert"]);
        assert_eq!(parser.parse("INVERT").expect("parse").as_action_string(), "invert");
        assert!(parser.parse("bleach").is_err());
    }

    #[test]
    fn canonical_action_string() {
        let pipeline = ActionPipelineParser::default()
            .parse("Trim , bleach")
            .expect("parse");
        assert_eq!(pipeline.as_action_string(), "trim|bleach");
        assert_eq!(pipeline.to_string(), "trim|bleach");
        assert_eq!(pipeline.len(), 2);
    }
}
