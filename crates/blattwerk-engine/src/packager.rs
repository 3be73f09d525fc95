// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact packager — bundles a handler's outputs into one zip archive.

use std::io::{Cursor, Write};

use blattwerk_core::MediaType;
use blattwerk_core::error::{BlattwerkError, Result};
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::Artifact;
use crate::ledger::ResourceLedger;

/// Writes several artifacts into a single archive artifact.
///
/// Entries keep the artifacts' display names and the order they were
/// handed in. Any failure is a fatal resource error.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactPackager {
    compression: CompressionMethod,
}

impl Default for ArtifactPackager {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ArtifactPackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store entries without compression. PNG and compressed PDF payloads
    /// gain little from deflate.
    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    /// Pack `artifacts` into a new archive artifact named `name`, allocated
    /// through `ledger`.
    #[instrument(skip_all, fields(ledger = %ledger.id(), entries = artifacts.len()))]
    pub fn pack(
        &self,
        ledger: &mut ResourceLedger,
        artifacts: &[Artifact],
        name: &str,
    ) -> Result<Artifact> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(self.compression);

        for artifact in artifacts {
            let bytes = ledger.read(artifact)?;
            zip.start_file(artifact.name(), options).map_err(|err| {
                BlattwerkError::fatal(format!("cannot add {} to archive: {err}", artifact.name()))
            })?;
            zip.write_all(&bytes).map_err(|err| {
                BlattwerkError::fatal(format!("cannot write {} to archive: {err}", artifact.name()))
            })?;
        }

        let archive = zip
            .finish()
            .map_err(|err| BlattwerkError::fatal(format!("cannot finish archive: {err}")))?
            .into_inner();
        debug!(archive_bytes = archive.len(), "archive packed");
        ledger.allocate(name, MediaType::Zip, &archive)
    }
}
