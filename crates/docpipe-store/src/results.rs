// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result store: artifacts, status markers and per-job metadata.
//
// Layout per id (as keys in the backing store):
//
//   <id>.<ext>        encoded result; its presence alone means "finished"
//   <id>.status       plain-text status marker
//   <id>.meta.json    JobMeta as JSON
//
// Nothing is written while a job is queued, so "no record at all" reads back
// as queued.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::types::{JobMeta, JobStatus, ResultId, StatusRecord};

use crate::kv::{FileStore, KeyValueStore, MemoryStore};

const STATUS_SUFFIX: &str = ".status";
const META_SUFFIX: &str = ".meta.json";

/// Persistent store of job results keyed by [`ResultId`].
#[derive(Clone)]
pub struct ResultStore {
    kv: Arc<dyn KeyValueStore>,
    extension: String,
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl ResultStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, extension: impl Into<String>) -> Self {
        Self {
            kv,
            extension: extension.into(),
        }
    }

    /// File-backed store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>, extension: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Arc::new(FileStore::open(dir)?), extension))
    }

    /// Store that lives only as long as the process.
    pub fn in_memory(extension: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), extension)
    }

    /// The backing key-value store, shared with the share table.
    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.kv)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Download name of an artifact, `<id>.<ext>`.
    pub fn file_name(&self, id: &ResultId) -> String {
        format!("{id}.{}", self.extension)
    }

    fn status_key(id: &ResultId) -> String {
        format!("{id}{STATUS_SUFFIX}")
    }

    fn meta_key(id: &ResultId) -> String {
        format!("{id}{META_SUFFIX}")
    }

    /// Persist the encoded artifact for `id`.
    #[instrument(skip(self, bytes), fields(id = %id, bytes = bytes.len()))]
    pub fn save(&self, id: &ResultId, bytes: &[u8]) -> Result<()> {
        self.kv.set(&self.file_name(id), bytes)?;
        info!("artifact saved");
        Ok(())
    }

    pub fn exists(&self, id: &ResultId) -> Result<bool> {
        self.kv.contains(&self.file_name(id))
    }

    /// Artifact bytes, or `NotFound` while the job has not finished.
    pub fn load(&self, id: &ResultId) -> Result<Vec<u8>> {
        self.kv
            .get(&self.file_name(id))?
            .ok_or_else(|| DocpipeError::NotFound(format!("result {id} not ready")))
    }

    /// Whether any record (artifact, marker or metadata) exists for `id`.
    pub fn has_record(&self, id: &ResultId) -> Result<bool> {
        Ok(self.exists(id)?
            || self.kv.contains(&Self::status_key(id))?
            || self.kv.contains(&Self::meta_key(id))?)
    }

    /// Write the metadata and status marker for a transition.
    ///
    /// Metadata goes first: a marker never names a status whose metadata is
    /// not yet stored.
    #[instrument(skip(self, meta), fields(id = %meta.id, status = %meta.status))]
    pub fn write_meta(&self, meta: &JobMeta) -> Result<()> {
        let json = serde_json::to_vec_pretty(meta)?;
        self.kv.set(&Self::meta_key(&meta.id), &json)?;
        self.kv
            .set(&Self::status_key(&meta.id), meta.status.as_str().as_bytes())?;
        debug!("job metadata written");
        Ok(())
    }

    /// Stored metadata. Unparseable records are logged and treated as absent.
    pub fn read_meta(&self, id: &ResultId) -> Result<Option<JobMeta>> {
        let Some(bytes) = self.kv.get(&Self::meta_key(id))? else {
            return Ok(None);
        };
        match serde_json::from_slice::<JobMeta>(&bytes) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(%id, error = %e, "corrupt job metadata ignored");
                Ok(None)
            }
        }
    }

    /// Merged status of `id`.
    ///
    /// The artifact wins over everything; then the status marker; then the
    /// metadata record; with nothing stored the job is queued. The marker is
    /// read before the metadata, so an error status always finds its message.
    #[instrument(skip(self), fields(id = %id))]
    pub fn status_of(&self, id: &ResultId) -> Result<StatusRecord> {
        let marker = self
            .kv
            .get(&Self::status_key(id))?
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|text| match text.parse::<JobStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    warn!(%id, marker = %text.trim(), "unrecognised status marker ignored");
                    None
                }
            });
        let meta = self.read_meta(id)?;
        let elapsed_ms = meta.as_ref().map(|m| m.elapsed_ms);

        if self.exists(id)? {
            return Ok(StatusRecord {
                id: id.clone(),
                status: JobStatus::Finished,
                elapsed_ms,
                error: None,
            });
        }

        let status = marker
            .or_else(|| meta.as_ref().map(|m| m.status))
            .unwrap_or(JobStatus::Queued);

        // A finished record whose artifact has gone is not finished.
        if status == JobStatus::Finished {
            return Ok(StatusRecord::queued(id.clone()));
        }

        let error = match (status, meta) {
            (JobStatus::Error, Some(meta)) => meta.error,
            _ => None,
        };
        Ok(StatusRecord {
            id: id.clone(),
            status,
            elapsed_ms,
            error,
        })
    }

    /// Remove everything stored for `id`. Returns how many records were
    /// removed; deleting an unknown id removes nothing.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&self, id: &ResultId) -> Result<usize> {
        let mut removed = 0;
        for key in [self.file_name(id), Self::status_key(id), Self::meta_key(id)] {
            if self.kv.delete(&key)? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "result deleted");
        }
        Ok(removed)
    }

    /// Ids that currently have an artifact, sorted.
    pub fn list_ids(&self) -> Result<Vec<ResultId>> {
        let suffix = format!(".{}", self.extension);
        let ids = self
            .kv
            .list()?
            .into_iter()
            .filter_map(|key| {
                let stem = key.strip_suffix(&suffix)?;
                ResultId::parse(stem).ok()
            })
            .collect();
        Ok(ids)
    }
}
