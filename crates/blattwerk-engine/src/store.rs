// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemeral store — the scratch namespace that every ledger allocates into.
//
// Layout:
//   <root>/
//     ledger-<uuid>/            one directory per open ledger
//       <uuid>-<display name>   one file per artifact
//
// Ledger and artifact names embed a v4 UUID, so concurrently open ledgers
// never collide even when clients upload identically named files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blattwerk_core::error::{BlattwerkError, Result};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::ledger::ResourceLedger;

/// Prefix of every ledger directory under the store root.
const LEDGER_DIR_PREFIX: &str = "ledger-";

/// Root of the ephemeral namespace, shared by all requests.
#[derive(Debug)]
pub struct EphemeralStore {
    root: PathBuf,
    ledgers_opened: AtomicU64,
    allocations: AtomicU64,
}

impl EphemeralStore {
    /// Create the store, making the root directory if it does not exist.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Arc<Self>> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|err| {
            BlattwerkError::fatal(format!("cannot create scratch root: {err}"))
        })?;
        info!("ephemeral store ready");
        Ok(Arc::new(Self {
            root,
            ledgers_opened: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a fresh ledger with its own directory under the root.
    pub fn open_ledger(self: &Arc<Self>) -> Result<ResourceLedger> {
        let id = Uuid::new_v4();
        let dir = self.root.join(format!("{LEDGER_DIR_PREFIX}{id}"));
        std::fs::create_dir(&dir).map_err(|err| {
            BlattwerkError::fatal(format!("cannot open ledger namespace: {err}"))
        })?;
        self.ledgers_opened.fetch_add(1, Ordering::Relaxed);
        debug!(ledger = %id, "ledger opened");
        Ok(ResourceLedger::new(id, dir, Arc::clone(self)))
    }

    /// Total ledgers opened since the store was created.
    pub fn ledgers_opened(&self) -> u64 {
        self.ledgers_opened.load(Ordering::Relaxed)
    }

    /// Total artifacts allocated since the store was created.
    pub fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Every ledger directory and artifact file currently on disk.
    ///
    /// Empty whenever no request is in flight.
    pub fn live_artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut live = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                for inner in std::fs::read_dir(&path)? {
                    live.push(inner?.path());
                }
            }
            live.push(path);
        }
        live.sort();
        Ok(live)
    }
}
