// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session archive: bundle results into a ZIP, or clear them in bulk.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use docpipe_core::error::{DocpipeError, Result};
use docpipe_core::types::ResultId;

use crate::results::ResultStore;
use crate::share::ShareLinkService;

/// Suggested download name for an archive.
pub const ARCHIVE_FILE_NAME: &str = "results.zip";

#[derive(Debug, Clone)]
pub struct SessionArchiveService {
    results: ResultStore,
    shares: Arc<ShareLinkService>,
}

impl SessionArchiveService {
    pub fn new(results: ResultStore, shares: Arc<ShareLinkService>) -> Self {
        Self { results, shares }
    }

    /// ZIP of the artifacts behind `ids`, each stored as `<id>.<ext>`.
    ///
    /// Duplicates collapse; malformed or unknown ids are skipped. When
    /// nothing is left the result is `EmptyArchive`.
    #[instrument(skip_all)]
    pub fn bundle<I, S>(&self, ids: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bundle_ids(valid_unique_ids(ids))
    }

    /// ZIP of every stored artifact.
    pub fn bundle_all(&self) -> Result<Vec<u8>> {
        self.bundle_ids(self.results.list_ids()?)
    }

    fn bundle_ids(&self, ids: Vec<ResultId>) -> Result<Vec<u8>> {
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.results.load(&id) {
                Ok(bytes) => entries.push((self.results.file_name(&id), bytes)),
                Err(DocpipeError::NotFound(_)) => debug!(%id, "no artifact, skipped"),
                Err(e) => return Err(e),
            }
        }
        if entries.is_empty() {
            return Err(DocpipeError::EmptyArchive);
        }

        let count = entries.len();
        let archive = write_zip(entries)?;
        info!(entries = count, bytes = archive.len(), "archive built");
        Ok(archive)
    }

    /// Delete the results behind `ids` and revoke their share links.
    ///
    /// Returns how many artifacts were removed. Unknown and malformed ids are
    /// ignored.
    #[instrument(skip_all)]
    pub fn clear<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed_artifacts = 0;
        let mut touched = Vec::new();
        for id in valid_unique_ids(ids) {
            let had_artifact = self.results.exists(&id)?;
            if self.results.delete(&id)? > 0 {
                if had_artifact {
                    removed_artifacts += 1;
                }
                touched.push(id);
            }
        }

        let mut revoked = 0;
        for id in &touched {
            revoked += self.shares.revoke_all_for(id)?;
        }
        info!(removed_artifacts, revoked, "results cleared");
        Ok(removed_artifacts)
    }
}

/// Parse, drop malformed entries, and dedupe while keeping first-seen order.
fn valid_unique_ids<I, S>(ids: I) -> Vec<ResultId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter_map(|raw| match ResultId::parse(raw.as_ref().trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(raw = raw.as_ref(), "malformed id skipped");
                None
            }
        })
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Deflate `entries` into an in-memory ZIP.
fn write_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| DocpipeError::Archive(e.to_string());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(name, options).map_err(zip_err)?;
        writer.write_all(&bytes)?;
    }
    Ok(writer.finish().map_err(zip_err)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn setup() -> (SessionArchiveService, ResultStore, Arc<ShareLinkService>) {
        let results = ResultStore::in_memory("jpg");
        let shares = Arc::new(ShareLinkService::new(results.clone(), "share_links.json", None));
        (
            SessionArchiveService::new(results.clone(), Arc::clone(&shares)),
            results,
            shares,
        )
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).expect("valid zip");
        (0..zip.len())
            .map(|i| zip.by_index(i).expect("entry").name().to_owned())
            .collect()
    }

    #[test]
    fn empty_and_unknown_selections_fail() {
        let (archive, _, _) = setup();
        let none: [&str; 0] = [];
        assert!(matches!(archive.bundle(none), Err(DocpipeError::EmptyArchive)));

        let unknown = ResultId::generate().to_string();
        assert!(matches!(
            archive.bundle([unknown.as_str(), "not-an-id"]),
            Err(DocpipeError::EmptyArchive)
        ));
    }

    #[test]
    fn only_existing_artifacts_are_bundled_once() {
        let (archive, results, _) = setup();
        let present = ResultId::generate();
        let missing = ResultId::generate();
        results.save(&present, b"jpeg bytes").expect("save");

        let upper = present.to_string().to_uppercase();
        let zip = archive
            .bundle([present.to_string(), missing.to_string(), upper])
            .expect("bundle");
        assert_eq!(entry_names(&zip), vec![format!("{present}.jpg")]);

        let mut reader = ZipArchive::new(Cursor::new(zip.as_slice())).expect("zip");
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut reader.by_index(0).expect("entry"), &mut content)
            .expect("read");
        assert_eq!(content, b"jpeg bytes");
    }

    #[test]
    fn bundle_all_includes_every_artifact() {
        let (archive, results, _) = setup();
        let ids = [ResultId::generate(), ResultId::generate()];
        for id in &ids {
            results.save(id, b"x").expect("save");
        }
        let mut names = entry_names(&archive.bundle_all().expect("bundle all"));
        names.sort();
        let mut expected: Vec<String> = ids.iter().map(|id| format!("{id}.jpg")).collect();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn clear_deletes_and_revokes() {
        let (archive, results, shares) = setup();
        let id = ResultId::generate();
        results.save(&id, b"x").expect("save");
        let link = shares.create(&id, None).expect("share");

        let raw = id.to_string();
        let removed = archive
            .clear([raw.as_str(), raw.as_str(), "garbage"])
            .expect("clear");
        assert_eq!(removed, 1);
        assert!(!results.exists(&id).expect("exists"));
        assert!(shares.tokens_for(&id).expect("tokens").is_empty());
        assert!(shares.resolve(link.token.as_str()).is_err());

        assert_eq!(archive.clear([raw.as_str()]).expect("clear again"), 0);
    }
}
