// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifacts — handles to named, typed byte payloads held in the ephemeral
// namespace on behalf of one ledger.

use std::fmt;
use std::path::{Path, PathBuf};

use blattwerk_core::MediaType;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Unique identifier of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, typed payload allocated through a [`ResourceLedger`].
///
/// The handle is cheap to clone. The bytes behind it are only reachable
/// through the ledger that allocated it, and only while that ledger is open.
///
/// [`ResourceLedger`]: crate::ledger::ResourceLedger
#[derive(Debug, Clone)]
pub struct Artifact {
    pub(crate) id: ArtifactId,
    pub(crate) ledger: Uuid,
    pub(crate) name: String,
    pub(crate) media_type: MediaType,
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
    pub(crate) sha256: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    /// Display name, e.g. `page_3.pdf`. Becomes the entry name when the
    /// artifact is packaged.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lowercase hex SHA-256 of the payload at allocation time.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Compute the SHA-256 hash of `data` as a lowercase hex string.
pub(crate) fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
