// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Share links: random tokens that resolve to a stored result.
//
// The whole table is one flat JSON object `{ token: result_id }` stored under
// a single key and rewritten on every mutation. Mutations from this process
// are serialized by a mutex; other processes writing the same table can
// still lose updates.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::types::{ResultId, ShareToken};

use crate::kv::KeyValueStore;
use crate::netaddr::resolve_base_url;
use crate::results::ResultStore;

type ShareTable = BTreeMap<String, String>;

/// A freshly created share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    pub token: ShareToken,
    pub result_id: ResultId,
    /// Fully-qualified `<base>/share/<token>` URL.
    pub url: String,
}

pub struct ShareLinkService {
    kv: Arc<dyn KeyValueStore>,
    table_key: String,
    results: ResultStore,
    public_base_url: Option<String>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ShareLinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLinkService")
            .field("table_key", &self.table_key)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl ShareLinkService {
    /// Share table stored under `table_key` in the same backend as `results`.
    pub fn new(
        results: ResultStore,
        table_key: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            kv: results.backend(),
            table_key: table_key.into(),
            results,
            public_base_url,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| DocpipeError::Storage("share table lock poisoned".into()))
    }

    /// Current table. A missing table is empty; so is one that fails to parse.
    fn load_table(&self) -> Result<ShareTable> {
        let Some(bytes) = self.kv.get(&self.table_key)? else {
            return Ok(ShareTable::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!(key = %self.table_key, error = %e, "corrupt share table treated as empty");
                Ok(ShareTable::new())
            }
        }
    }

    fn store_table(&self, table: &ShareTable) -> Result<()> {
        let json = serde_json::to_vec_pretty(table)?;
        self.kv.set(&self.table_key, &json)
    }

    /// Mint a new token for `result_id`.
    ///
    /// `request_host` is the `Host` of the inbound request, used to build the
    /// URL when no public base URL is configured.
    #[instrument(skip(self), fields(id = %result_id))]
    pub fn create(&self, result_id: &ResultId, request_host: Option<&str>) -> Result<ShareLink> {
        if !self.results.exists(result_id)? {
            return Err(DocpipeError::NotFound(format!("result {result_id} not found")));
        }

        let token = ShareToken::generate();
        {
            let _guard = self.lock()?;
            let mut table = self.load_table()?;
            table.insert(token.to_string(), result_id.to_string());
            self.store_table(&table)?;
        }

        let base = resolve_base_url(self.public_base_url.as_deref(), request_host);
        let url = format!("{base}/share/{token}");
        info!(%url, "share link created");
        Ok(ShareLink {
            token,
            result_id: result_id.clone(),
            url,
        })
    }

    /// Result id behind `token`.
    ///
    /// Unknown tokens, and tokens whose result has since been deleted, are
    /// `NotFound`.
    #[instrument(skip(self))]
    pub fn resolve(&self, token: &str) -> Result<ResultId> {
        let token = ShareToken::parse(token)?;
        let table = self.load_table()?;
        let id = table
            .get(token.as_str())
            .and_then(|raw| ResultId::parse(raw).ok())
            .ok_or_else(|| DocpipeError::NotFound("share link not found".into()))?;

        if !self.results.exists(&id)? {
            debug!(%id, "share link points at a deleted result");
            return Err(DocpipeError::NotFound("shared result no longer exists".into()));
        }
        Ok(id)
    }

    /// Tokens currently pointing at `result_id`.
    pub fn tokens_for(&self, result_id: &ResultId) -> Result<Vec<ShareToken>> {
        Ok(self
            .load_table()?
            .into_iter()
            .filter(|(_, id)| id == result_id.as_str())
            .filter_map(|(token, _)| ShareToken::parse(&token).ok())
            .collect())
    }

    /// Drop every token pointing at `result_id`. Returns how many were removed.
    #[instrument(skip(self), fields(id = %result_id))]
    pub fn revoke_all_for(&self, result_id: &ResultId) -> Result<usize> {
        let _guard = self.lock()?;
        let mut table = self.load_table()?;
        let before = table.len();
        table.retain(|_, id| id != result_id.as_str());
        let revoked = before - table.len();
        if revoked > 0 {
            self.store_table(&table)?;
            info!(revoked, "share links revoked");
        }
        Ok(revoked)
    }
}
