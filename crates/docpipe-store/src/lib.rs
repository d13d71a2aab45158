// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docpipe-store: Persistence for job results.
//
// A `KeyValueStore` backend (files, memory or SQLite) sits under the result
// store, the share-link table and the session archive.

pub mod archive;
pub mod kv;
pub mod netaddr;
pub mod results;
pub mod share;

pub use archive::{ARCHIVE_FILE_NAME, SessionArchiveService};
pub use kv::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
pub use netaddr::resolve_base_url;
pub use results::ResultStore;
pub use share::{ShareLink, ShareLinkService};
