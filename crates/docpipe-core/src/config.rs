// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `public_base_url`.
pub const BASE_URL_ENV: &str = "DOCPIPE_PUBLIC_BASE_URL";

/// Where results, markers, metadata and the share table are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One file per record inside `result_dir`.
    #[default]
    Files,
    /// A single SQLite database, `result_dir/docpipe.db`.
    Sqlite,
}

/// File name of the SQLite database used by [`StorageBackend::Sqlite`].
pub const SQLITE_FILE: &str = "docpipe.db";

/// Persistent service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding artifacts, status markers, metadata and the share table.
    pub result_dir: PathBuf,
    pub storage: StorageBackend,
    /// Base URL used for share links (e.g. `https://scans.example.org`).
    /// When unset, links are derived from the inbound request host.
    pub public_base_url: Option<String>,
    /// File extension of stored artifacts.
    pub artifact_extension: String,
    /// JPEG quality (1-100) for encoded results.
    pub jpeg_quality: u8,
    /// Upper bound on jobs running at the same time.
    pub max_concurrent_jobs: usize,
    /// Per-job wall-clock limit; `None` lets a job run indefinitely.
    pub job_timeout_secs: Option<u64>,
    /// File name of the share table inside `result_dir`.
    pub share_table_file: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            result_dir: PathBuf::from("results"),
            storage: StorageBackend::Files,
            public_base_url: None,
            artifact_extension: "jpg".into(),
            jpeg_quality: 95,
            max_concurrent_jobs: 4,
            job_timeout_secs: Some(300),
            share_table_file: "share_links.json".into(),
        }
    }
}

impl ServiceConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            result_dir: data_dir.join("results"),
            ..Self::default()
        }
    }

    /// Load `config.json` from `data_dir`, falling back to defaults when the
    /// file is missing or unreadable. `DOCPIPE_PUBLIC_BASE_URL` wins over the
    /// stored base URL.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::with_data_dir(data_dir)
            }),
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::with_data_dir(data_dir)
            }
        };
        if let Ok(base) = std::env::var(BASE_URL_ENV) {
            let base = base.trim();
            if !base.is_empty() {
                config.public_base_url = Some(base.to_owned());
            }
        }
        config
    }

    /// Write the configuration to `<data_dir>/config.json`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.result_dir.join(SQLITE_FILE)
    }

    /// Full path of the share table.
    pub fn share_table_path(&self) -> PathBuf {
        self.result_dir.join(&self.share_table_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_config_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = ServiceConfig::with_data_dir(dir.path());
        config.max_concurrent_jobs = 9;
        config.job_timeout_secs = None;
        config.persist(dir.path()).expect("persist");

        let loaded = ServiceConfig::load(dir.path());
        assert_eq!(loaded.max_concurrent_jobs, 9);
        assert_eq!(loaded.job_timeout(), None);
        assert_eq!(loaded.result_dir, dir.path().join("results"));
    }

    #[test]
    fn corrupt_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").expect("write");
        let loaded = ServiceConfig::load(dir.path());
        assert_eq!(loaded.artifact_extension, "jpg");
        assert_eq!(loaded.result_dir, dir.path().join("results"));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"jpeg_quality": 80}"#).expect("parse");
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.share_table_file, "share_links.json");
        assert_eq!(config.storage, StorageBackend::Files);
    }

    #[test]
    fn sqlite_backend_is_selectable() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"storage": "sqlite", "result_dir": "/srv/scans"}"#)
                .expect("parse");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.sqlite_path(), PathBuf::from("/srv/scans/docpipe.db"));
    }
}
