// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: wires configuration, storage, the step registry,
// the executor, share links and archives behind one handle.
//
// Every method that takes an id or token accepts the raw caller string and
// validates it before touching storage.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::types::{ResultId, StatusRecord};
use docpipe_core::{ServiceConfig, StorageBackend};
use docpipe_imaging::{StepRegistry, TransformationRegistry};
use docpipe_store::{
    FileStore, KeyValueStore, MemoryStore, ResultStore, SessionArchiveService, ShareLink,
    ShareLinkService, SqliteStore,
};

use crate::executor::JobExecutor;

/// Handle returned by [`DocumentService::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub job_id: ResultId,
    pub status_url: String,
    pub result_url: String,
}

/// Shared service handle.
///
/// All fields are cheaply cloneable (Arc-wrapped) so the struct can be moved
/// into tasks and request handlers freely.
#[derive(Clone)]
pub struct DocumentService {
    config: Arc<ServiceConfig>,
    store: ResultStore,
    executor: JobExecutor,
    shares: Arc<ShareLinkService>,
    archive: SessionArchiveService,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// Open persistent storage under `config.result_dir` and wire up the
    /// built-in steps.
    pub fn init(config: ServiceConfig) -> Result<Self> {
        info!(
            path = %config.result_dir.display(),
            storage = ?config.storage,
            "initialising document service"
        );
        let backend: Arc<dyn KeyValueStore> = match config.storage {
            StorageBackend::Files => Arc::new(FileStore::open(&config.result_dir)?),
            StorageBackend::Sqlite => {
                std::fs::create_dir_all(&config.result_dir)?;
                Arc::new(SqliteStore::open(config.sqlite_path())?)
            }
        };
        Ok(Self::with_parts(config, backend, builtin_registry()?))
    }

    /// Load `config.json` from `data_dir` (or defaults) and [`init`](Self::init).
    pub fn from_data_dir(data_dir: &Path) -> Result<Self> {
        Self::init(ServiceConfig::load(data_dir))
    }

    /// Service whose results vanish with the process.
    pub fn in_memory(config: ServiceConfig) -> Result<Self> {
        info!("initialising in-memory document service");
        Ok(Self::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            builtin_registry()?,
        ))
    }

    /// Wire a service from an explicit backend and registry.
    pub fn with_parts(
        config: ServiceConfig,
        backend: Arc<dyn KeyValueStore>,
        registry: Arc<dyn TransformationRegistry>,
    ) -> Self {
        let store = ResultStore::new(backend, config.artifact_extension.clone());
        let shares = Arc::new(ShareLinkService::new(
            store.clone(),
            config.share_table_file.clone(),
            config.public_base_url.clone(),
        ));
        let archive = SessionArchiveService::new(store.clone(), Arc::clone(&shares));
        let executor = JobExecutor::new(registry, store.clone(), &config);

        Self {
            config: Arc::new(config),
            store,
            executor,
            shares,
            archive,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Step names accepted in actions.
    pub fn supported_steps(&self) -> Vec<String> {
        self.executor.parser().supported().map(str::to_owned).collect()
    }

    // -- Jobs ----------------------------------------------------------------

    /// Process an upload inline and return the encoded result.
    pub fn process(&self, image: &[u8], action: &str) -> Result<Vec<u8>> {
        let pipeline = self.executor.parser().parse(action)?;
        self.executor.run_sync(image, &pipeline)
    }

    /// Queue an upload for background processing.
    ///
    /// The action is validated by the job itself; a bad action shows up as
    /// an `error` status. Must be called from within a Tokio runtime.
    pub fn submit(&self, image: Vec<u8>, action: &str) -> Submission {
        let job_id = ResultId::generate();
        self.executor.run_async(job_id.clone(), image, action.to_owned());
        info!(%job_id, "job submitted");
        Submission {
            status_url: format!("/status/{job_id}"),
            result_url: format!("/result/{job_id}"),
            job_id,
        }
    }

    pub fn status(&self, id: &str) -> Result<StatusRecord> {
        self.store.status_of(&ResultId::parse(id)?)
    }

    /// Encoded result, or `NotFound` while the job is still running.
    pub fn result(&self, id: &str) -> Result<Vec<u8>> {
        self.store.load(&ResultId::parse(id)?)
    }

    /// Attachment name for a finished result.
    pub fn download_name(&self, id: &str) -> Result<String> {
        let id = ResultId::parse(id)?;
        if !self.store.exists(&id)? {
            return Err(DocpipeError::NotFound(format!("result {id} not ready")));
        }
        Ok(self.store.file_name(&id))
    }

    // -- Sharing -------------------------------------------------------------

    pub fn share(&self, id: &str, request_host: Option<&str>) -> Result<ShareLink> {
        self.shares.create(&ResultId::parse(id)?, request_host)
    }

    /// Resolve a share token to its result and the result's bytes.
    pub fn open_share(&self, token: &str) -> Result<(ResultId, Vec<u8>)> {
        let id = self.shares.resolve(token)?;
        let bytes = self.store.load(&id)?;
        Ok((id, bytes))
    }

    // -- Session archive -----------------------------------------------------

    pub fn bundle<I, S>(&self, ids: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.archive.bundle(ids)
    }

    pub fn bundle_all(&self) -> Result<Vec<u8>> {
        self.archive.bundle_all()
    }

    /// Delete results and revoke their share links; returns artifacts removed.
    pub fn clear<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.archive.clear(ids)
    }

    /// Cancel outstanding jobs and wait for workers to let go.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
        info!("document service stopped");
    }
}

/// Built-in steps, checked against the declared step set.
fn builtin_registry() -> Result<Arc<dyn TransformationRegistry>> {
    let registry = StepRegistry::builtin();
    registry.validate()?;
    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_core::types::JobStatus;

    fn service() -> DocumentService {
        DocumentService::in_memory(ServiceConfig::default()).expect("in-memory service")
    }

    #[test]
    fn supported_steps_are_the_builtin_set() {
        let mut steps = service().supported_steps();
        steps.sort();
        assert_eq!(
            steps,
            ["bleach", "denoise", "dewarp", "orientation", "shadow", "sharpen", "trim"]
        );
    }

    #[test]
    fn malformed_ids_never_reach_storage() {
        let svc = service();
        let not_hex = "g".repeat(32);
        for bad in ["../etc/passwd", "abc", not_hex.as_str()] {
            assert!(matches!(svc.status(bad), Err(DocpipeError::InvalidInput(_))));
            assert!(matches!(svc.result(bad), Err(DocpipeError::InvalidInput(_))));
            assert!(matches!(svc.share(bad, None), Err(DocpipeError::InvalidInput(_))));
        }
    }

    #[test]
    fn unknown_ids_read_as_queued_and_not_found() {
        let svc = service();
        let id = ResultId::generate().to_string().to_uppercase();
        assert_eq!(svc.status(&id).expect("status").status, JobStatus::Queued);
        assert!(matches!(svc.result(&id), Err(DocpipeError::NotFound(_))));
        assert!(matches!(svc.download_name(&id), Err(DocpipeError::NotFound(_))));
        assert!(matches!(svc.share(&id, None), Err(DocpipeError::NotFound(_))));
    }

    #[test]
    fn process_rejects_bad_actions_before_decoding() {
        let err = service()
            .process(b"not even an image", "trim|frobnicate|zap")
            .expect_err("bad action");
        let msg = err.to_string();
        assert!(matches!(err, DocpipeError::InvalidInput(_)));
        assert!(msg.contains("frobnicate") && msg.contains("zap"), "{msg}");
    }

    #[tokio::test]
    async fn submission_paths_follow_the_id() {
        let svc = service();
        let submission = svc.submit(b"junk".to_vec(), "bleach");
        assert_eq!(submission.status_url, format!("/status/{}", submission.job_id));
        assert_eq!(submission.result_url, format!("/result/{}", submission.job_id));
        svc.shutdown().await;
    }
}
