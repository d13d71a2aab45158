// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job executor: runs action pipelines inline or as background jobs.
//
// Background jobs follow `queued → processing → {finished | error}`:
//
//   1. wait for a worker slot (the job reads back as queued meanwhile)
//   2. persist `processing` + metadata
//   3. parse the action, decode, run the steps, encode (blocking pool)
//   4. save the artifact, then persist `finished`
//
// Any failure along the way, including a timeout, cancellation or a panicking
// step, is persisted as `error` with its message. Nothing is returned to the
// spawner.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::pipeline::{ActionPipeline, ActionPipelineParser};
use docpipe_core::types::{JobMeta, JobStatus, ResultId};
use docpipe_core::ServiceConfig;
use docpipe_imaging::{TransformationRegistry, decode, encode_jpeg};
use docpipe_store::ResultStore;

/// Decode `image`, apply every step of `pipeline` in order, encode as JPEG.
///
/// A step that fails or panics becomes a `ProcessingError` naming the step.
pub fn run_pipeline(
    registry: &dyn TransformationRegistry,
    image: &[u8],
    pipeline: &ActionPipeline,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    let mut raster = decode(image)?;
    for step in pipeline.steps() {
        let applied = catch_unwind(AssertUnwindSafe(|| registry.apply(step, raster)))
            .map_err(|_| DocpipeError::step(step, "step panicked"))?;
        raster = applied.map_err(|e| match e {
            DocpipeError::ProcessingError { .. } => e,
            other => DocpipeError::step(step, other),
        })?;
    }
    encode_jpeg(&raster, jpeg_quality)
}

/// Runs pipelines against a transformation registry and records background
/// jobs in a [`ResultStore`].
///
/// Cheap to clone; clones share the worker pool and cancellation token.
#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<dyn TransformationRegistry>,
    parser: ActionPipelineParser,
    store: ResultStore,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    job_timeout: Option<Duration>,
    jpeg_quality: u8,
    cancel: CancellationToken,
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("max_concurrent", &self.max_concurrent)
            .field("job_timeout", &self.job_timeout)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

/// Largest pool the semaphore (and `acquire_many` on shutdown) can represent.
const MAX_WORKERS: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

impl JobExecutor {
    pub fn new(
        registry: Arc<dyn TransformationRegistry>,
        store: ResultStore,
        config: &ServiceConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent_jobs.clamp(1, MAX_WORKERS);
        if max_concurrent != config.max_concurrent_jobs {
            warn!(
                requested = config.max_concurrent_jobs,
                using = max_concurrent,
                "worker pool size clamped"
            );
        }
        Self {
            parser: registry.parser(),
            registry,
            store,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            job_timeout: config.job_timeout(),
            jpeg_quality: config.jpeg_quality,
            cancel: CancellationToken::new(),
        }
    }

    /// Parser accepting exactly the registry's steps.
    pub fn parser(&self) -> &ActionPipelineParser {
        &self.parser
    }

    /// Process inline. Touches no persisted state.
    #[instrument(skip(self, image), fields(bytes = image.len(), action = %pipeline))]
    pub fn run_sync(&self, image: &[u8], pipeline: &ActionPipeline) -> Result<Vec<u8>> {
        let started = Instant::now();
        let out = run_pipeline(self.registry.as_ref(), image, pipeline, self.jpeg_quality)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "inline job done");
        Ok(out)
    }

    /// Start a background job and return immediately.
    ///
    /// Must be called from within a Tokio runtime. The returned handle only
    /// signals completion; the outcome is read back through the store.
    pub fn run_async(&self, id: ResultId, image: Vec<u8>, action: String) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move { worker.run_job(id, image, action).await })
    }

    /// Stop accepting work: queued jobs fail as cancelled, running jobs are
    /// abandoned and recorded as cancelled. Resolves once every worker slot
    /// has been released, which includes abandoned steps running to the end.
    pub async fn shutdown(&self) {
        info!("executor shutting down");
        self.cancel.cancel();
        let _ = self.permits.acquire_many(self.max_concurrent as u32).await;
        self.permits.close();
        debug!("all worker slots released");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&ResultStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| DocpipeError::Storage(format!("store task failed: {e}")))?
    }

    async fn has_record(&self, id: &ResultId) -> Result<bool> {
        let id = id.clone();
        self.with_store(move |store| store.has_record(&id)).await
    }

    /// False once the job's records have been deleted (or cannot be read).
    async fn still_tracked(&self, id: &ResultId) -> bool {
        match self.has_record(id).await {
            Ok(present) => present,
            Err(e) => {
                error!(%id, error = %e, "could not check job record");
                false
            }
        }
    }

    #[instrument(skip(self, image, action), fields(id = %id))]
    async fn run_job(self, id: ResultId, image: Vec<u8>, action: String) {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            match self.has_record(&id).await {
                Ok(false) => self.fail(&id, &action, 0, &DocpipeError::Cancelled).await,
                Ok(true) => debug!("cancelled before start; existing record left alone"),
                Err(e) => error!(error = %e, "could not check for an existing record"),
            }
            return;
        };

        match self.has_record(&id).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("job id already has a record, refusing to run it again");
                return;
            }
            Err(e) => {
                error!(error = %e, "could not check for an existing record");
                return;
            }
        }

        let started = Instant::now();
        let processing = JobMeta::new(id.clone(), action.clone(), JobStatus::Processing);
        if let Err(e) = self.with_store(move |store| store.write_meta(&processing)).await {
            error!(error = %e, "could not persist processing status");
            self.fail(&id, &action, 0, &e).await;
            return;
        }
        info!(%action, "job processing");

        let outcome = self.execute(&id, image, &action, permit).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Some(canonical)) => {
                if !self.still_tracked(&id).await {
                    info!("result deleted while finishing; status not written");
                    return;
                }
                let mut meta = JobMeta::new(id.clone(), canonical, JobStatus::Finished);
                meta.elapsed_ms = elapsed_ms;
                // The artifact is already in place, so the job reads as
                // finished even if this write fails.
                if let Err(e) = self.with_store(move |store| store.write_meta(&meta)).await {
                    error!(error = %e, "could not persist finished status");
                }
                info!(elapsed_ms, "job finished");
            }
            Ok(None) => info!("result deleted while processing; output dropped"),
            Err(e) => {
                if self.still_tracked(&id).await {
                    self.fail(&id, &action, elapsed_ms, &e).await;
                } else {
                    info!(error = %e, "result deleted while processing; failure not recorded");
                }
            }
        }
    }

    /// Parse, run and save. Returns the canonical action string, or `None`
    /// when the job's records were deleted before the artifact could be saved.
    ///
    /// `permit` moves onto the blocking thread so the worker slot stays taken
    /// until the steps actually return, even after a timeout or cancellation.
    async fn execute(
        &self,
        id: &ResultId,
        image: Vec<u8>,
        action: &str,
        permit: OwnedSemaphorePermit,
    ) -> Result<Option<String>> {
        let pipeline = self.parser.parse(action)?;
        let canonical = pipeline.as_action_string();

        let registry = Arc::clone(&self.registry);
        let quality = self.jpeg_quality;
        let task = tokio::task::spawn_blocking(move || {
            let out = run_pipeline(registry.as_ref(), &image, &pipeline, quality);
            drop(permit);
            out
        });

        let joined = match self.job_timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DocpipeError::Cancelled),
                res = tokio::time::timeout(limit, task) => {
                    res.map_err(|_| DocpipeError::TimedOut(limit))?
                }
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DocpipeError::Cancelled),
                res = task => res,
            },
        };

        let bytes = joined.map_err(|e| {
            if e.is_panic() {
                DocpipeError::step("pipeline", "worker panicked")
            } else {
                DocpipeError::step("pipeline", e)
            }
        })??;

        if !self.still_tracked(id).await {
            return Ok(None);
        }
        let target = id.clone();
        self.with_store(move |store| store.save(&target, &bytes)).await?;
        Ok(Some(canonical))
    }

    async fn fail(&self, id: &ResultId, action: &str, elapsed_ms: u64, err: &DocpipeError) {
        warn!(%id, error = %err, "job failed");
        let mut meta = JobMeta::new(id.clone(), action, JobStatus::Error);
        meta.elapsed_ms = elapsed_ms;
        meta.error = Some(err.to_string());
        if let Err(e) = self.with_store(move |store| store.write_meta(&meta)).await {
            error!(%id, error = %e, "could not persist error status");
        }
    }
}
