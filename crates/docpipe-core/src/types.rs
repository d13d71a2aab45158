// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: identifiers, job status and per-job metadata.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocpipeError, Result};

/// Length of every identifier that may end up in a path or a share table.
pub const HEX_ID_LEN: usize = 32;

/// Validate a 32-character hex identifier and normalise it to lowercase.
///
/// Anything else (wrong length, non-hex characters, path separators, `..`)
/// is rejected before it can reach the filesystem.
pub fn normalize_hex_id(raw: &str, what: &str) -> Result<String> {
    if raw.len() != HEX_ID_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DocpipeError::InvalidInput(format!(
            "{what} must be {HEX_ID_LEN} hex characters"
        )));
    }
    Ok(raw.to_ascii_lowercase())
}

fn random_hex_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Identifier of one job and of the result it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResultId(String);

impl ResultId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    /// Parse and normalise a caller-supplied id.
    pub fn parse(raw: &str) -> Result<Self> {
        normalize_hex_id(raw, "result id").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ResultId {
    type Err = DocpipeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResultId {
    type Error = DocpipeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ResultId> for String {
    fn from(id: ResultId) -> Self {
        id.0
    }
}

impl AsRef<str> for ResultId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credential that resolves to a [`ResultId`] through the share table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareToken(String);

impl ShareToken {
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        normalize_hex_id(raw, "share token").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShareToken {
    type Error = DocpipeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ShareToken> for String {
    fn from(token: ShareToken) -> Self {
        token.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a processing job.
///
/// `Queued` is never written to storage: a job with no record at all is
/// queued by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker is running the pipeline.
    Processing,
    /// The artifact has been written.
    Finished,
    /// The pipeline failed; see the metadata error field.
    Error,
}

impl JobStatus {
    /// The plain-text form used by status markers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Whether `next` is a legal one-way step from `self`.
    ///
    /// `queued → processing → {finished | error}`. Failing straight out of
    /// the queue is allowed (e.g. the job is cancelled before a worker
    /// picks it up).
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Queued, Self::Error)
                | (Self::Processing, Self::Finished)
                | (Self::Processing, Self::Error)
        )
    }
}

impl FromStr for JobStatus {
    type Err = DocpipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "finished" => Ok(Self::Finished),
            "error" => Ok(Self::Error),
            other => Err(DocpipeError::InvalidInput(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record persisted next to each job, rewritten at every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub id: ResultId,
    /// Canonical action string (`step|step|...`), or the raw input when it
    /// never parsed.
    pub action: String,
    pub status: JobStatus,
    /// Wall-clock time spent in the worker so far.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobMeta {
    pub fn new(id: ResultId, action: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id,
            action: action.into(),
            status,
            elapsed_ms: 0,
            error: None,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Merged view of a job's state as seen by a poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: ResultId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn queued(id: ResultId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            elapsed_ms: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_lowercase_hex() {
        let id = ResultId::generate();
        assert_eq!(id.as_str().len(), HEX_ID_LEN);
        assert!(id.as_str().bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        assert_ne!(id, ResultId::generate());
    }

    #[test]
    fn parse_normalises_case() {
        let id = ResultId::parse("ABCDEF0123456789ABCDEF0123456789").expect("valid id");
        assert_eq!(id.as_str(), "abcdef0123456789abcdef0123456789");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in [
            "",
            "abc",
            "abcdef0123456789abcdef012345678",
            "abcdef0123456789abcdef01234567890",
            "ghijkl0123456789abcdef0123456789",
            "../../../../../../../../etc/pass",
            "abcdef0123456789abcdef01234/6789",
            "abcdef0123456789abcdef01234\\6789",
            "..cdef0123456789abcdef0123456789",
            "abcdef0123456789abcdef012345678é",
        ] {
            assert!(
                matches!(ResultId::parse(bad), Err(DocpipeError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ResultId::parse("0123456789abcdef0123456789abcdef").expect("valid id");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"0123456789abcdef0123456789abcdef\"");
        assert!(serde_json::from_str::<ResultId>("\"../etc\"").is_err());
    }

    #[test]
    fn status_transitions_are_one_way() {
        use JobStatus::*;
        assert!(Queued.can_advance_to(Processing));
        assert!(Processing.can_advance_to(Finished));
        assert!(Processing.can_advance_to(Error));
        assert!(!Processing.can_advance_to(Queued));
        assert!(!Finished.can_advance_to(Error));
        assert!(!Error.can_advance_to(Finished));
        assert!(!Finished.can_advance_to(Processing));
    }

    #[test]
    fn status_marker_round_trips_through_text() {
        use JobStatus::*;
        for status in [Queued, Processing, Finished, Error] {
            assert_eq!(status.as_str().parse::<JobStatus>().expect("parse"), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn meta_omits_missing_error() {
        let id = ResultId::generate();
        let mut meta = JobMeta::new(id, "bleach", JobStatus::Processing);
        meta.updated_at = None;
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(json["status"], "processing");
        assert!(json.get("error").is_none());
        assert!(json.get("updated_at").is_none());
    }
}
