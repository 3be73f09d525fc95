// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resource ledger — owns every artifact allocated while serving one request
// and guarantees their release.
//
// State machine:
//
//   Open ──close()──▶ Closing ──▶ Closed
//
// Allocation is only possible while Open. `close()` releases artifacts in
// reverse allocation order, keeps going past individual failures, and is a
// no-op once Closed. Dropping an unclosed ledger closes it.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blattwerk_core::MediaType;
use blattwerk_core::error::{BlattwerkError, Result};
use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactId, hash_bytes};
use crate::store::EphemeralStore;

/// Lifecycle state of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Open,
    Closing,
    Closed,
}

/// What has happened to a tracked artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Allocated and still on disk.
    Pending,
    /// Streamed to the caller; still on disk until close.
    Delivered,
    /// Removed from the ephemeral namespace.
    Released,
}

/// Outcome of [`ResourceLedger::close`].
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Artifacts removed by this call.
    pub released: usize,
    /// Non-fatal resource errors for artifacts (or the ledger directory)
    /// that could not be removed.
    pub failures: Vec<BlattwerkError>,
}

impl CloseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
struct Entry {
    artifact: Artifact,
    disposition: Disposition,
}

/// Tracks the artifacts of exactly one request.
#[derive(Debug)]
pub struct ResourceLedger {
    id: Uuid,
    dir: PathBuf,
    store: Arc<EphemeralStore>,
    state: LedgerState,
    entries: Vec<Entry>,
}

impl ResourceLedger {
    pub(crate) fn new(id: Uuid, dir: PathBuf, store: Arc<EphemeralStore>) -> Self {
        Self {
            id,
            dir,
            store,
            state: LedgerState::Open,
            entries: Vec::new(),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    /// Number of artifacts allocated through this ledger.
    pub fn artifact_count(&self) -> usize {
        self.entries.len()
    }

    /// Disposition of `artifact`, or `None` if this ledger never tracked it.
    pub fn disposition(&self, artifact: &Artifact) -> Option<Disposition> {
        self.entry(artifact).map(|entry| entry.disposition)
    }

    /// Whether `artifact` was allocated through this ledger.
    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.entry(artifact).is_some()
    }

    fn entry(&self, artifact: &Artifact) -> Option<&Entry> {
        if artifact.ledger != self.id {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.artifact.id == artifact.id)
    }

    // -- Allocation -----------------------------------------------------------

    /// Store `bytes` as a new artifact named `name`.
    #[instrument(skip(self, bytes), fields(ledger = %self.id, bytes_len = bytes.len()))]
    pub fn allocate(
        &mut self,
        name: impl Into<String> + std::fmt::Debug,
        media_type: MediaType,
        bytes: &[u8],
    ) -> Result<Artifact> {
        if self.state != LedgerState::Open {
            return Err(BlattwerkError::fatal(format!(
                "ledger {} is {:?}; allocation refused",
                self.id, self.state
            )));
        }

        let name = name.into();
        let id = ArtifactId::new();
        let path = self.dir.join(format!("{id}-{name}"));
        write_new(&path, bytes, |file, bytes| file.write_all(bytes))
            .map_err(|err| BlattwerkError::fatal(format!("cannot allocate artifact: {err}")))?;
        self.store.record_allocation();

        let artifact = Artifact {
            id,
            ledger: self.id,
            name,
            media_type,
            path,
            size: bytes.len() as u64,
            sha256: hash_bytes(bytes),
            created_at: Utc::now(),
        };
        debug!(artifact = %artifact.id, name = %artifact.name, "artifact allocated");
        self.entries.push(Entry {
            artifact: artifact.clone(),
            disposition: Disposition::Pending,
        });
        Ok(artifact)
    }

    /// Read back the payload of an artifact owned by this ledger.
    ///
    /// The content is re-hashed and compared with the digest taken at
    /// allocation time.
    pub fn read(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        if self.state != LedgerState::Open {
            return Err(BlattwerkError::fatal(format!(
                "ledger {} is {:?}; read refused",
                self.id, self.state
            )));
        }
        let entry = self.entry(artifact).ok_or_else(|| {
            BlattwerkError::fatal(format!("artifact {} is not tracked by this ledger", artifact.id))
        })?;
        if entry.disposition == Disposition::Released {
            return Err(BlattwerkError::fatal(format!(
                "artifact {} was already released",
                artifact.id
            )));
        }

        let bytes = std::fs::read(artifact.path())
            .map_err(|err| BlattwerkError::fatal(format!("cannot read artifact: {err}")))?;
        if hash_bytes(&bytes) != artifact.sha256 {
            return Err(BlattwerkError::fatal(format!(
                "artifact {} changed after allocation",
                artifact.id
            )));
        }
        Ok(bytes)
    }

    /// Record that `artifact` has been handed to the caller.
    pub fn mark_delivered(&mut self, artifact: &Artifact) -> Result<()> {
        let ledger = self.id;
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.artifact.id == artifact.id && artifact.ledger == ledger)
            .ok_or_else(|| {
                BlattwerkError::fatal(format!("artifact {} is not tracked by this ledger", artifact.id))
            })?;
        if entry.disposition == Disposition::Pending {
            entry.disposition = Disposition::Delivered;
        }
        Ok(())
    }

    // -- Release --------------------------------------------------------------

    /// Release every artifact not yet released, newest first, then remove
    /// the ledger directory.
    ///
    /// Calling `close` again after it has completed does nothing and
    /// returns an empty report.
    #[instrument(skip(self), fields(ledger = %self.id))]
    pub fn close(&mut self) -> CloseReport {
        let mut report = CloseReport::default();
        if self.state == LedgerState::Closed {
            return report;
        }
        self.state = LedgerState::Closing;

        for entry in self.entries.iter_mut().rev() {
            if entry.disposition == Disposition::Released {
                continue;
            }
            match std::fs::remove_file(entry.artifact.path()) {
                Ok(()) => {
                    entry.disposition = Disposition::Released;
                    report.released += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    entry.disposition = Disposition::Released;
                }
                Err(err) => {
                    warn!(
                        ledger = %self.id,
                        artifact = %entry.artifact.id,
                        %err,
                        "artifact could not be released"
                    );
                    report.failures.push(BlattwerkError::non_fatal(format!(
                        "artifact {} could not be released: {err}",
                        entry.artifact.id
                    )));
                }
            }
        }

        match std::fs::remove_dir(&self.dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(ledger = %self.id, %err, "ledger namespace could not be removed");
                report.failures.push(BlattwerkError::non_fatal(format!(
                    "ledger {} namespace could not be removed: {err}",
                    self.id
                )));
            }
        }

        self.state = LedgerState::Closed;
        debug!(
            released = report.released,
            failures = report.failures.len(),
            "ledger closed"
        );
        report
    }
}

/// Create `path` and fill it with `write`. A file left behind by a failed
/// write is removed before the error is returned, since no ledger entry
/// tracks it.
fn write_new<W>(path: &Path, bytes: &[u8], write: W) -> std::io::Result<()>
where
    W: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
{
    let mut file = File::create(path)?;
    if let Err(err) = write(&mut file, bytes) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            warn!(%cleanup, "partial artifact could not be removed");
        }
        return Err(err);
    }
    Ok(())
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        if self.state != LedgerState::Closed {
            let report = self.close();
            if !report.is_clean() {
                warn!(
                    ledger = %self.id,
                    failures = report.failures.len(),
                    "ledger dropped with unreleased artifacts"
                );
            }
        }
    }
}
