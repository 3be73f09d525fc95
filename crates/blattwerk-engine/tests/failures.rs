// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failures late in the pipeline: packaging errors and release failures
// while another error is already being reported.

mod common;

use std::path::{Path, PathBuf};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{AppConfig, ErrorKind, MediaType, Request};
use blattwerk_engine::{
    Arity, Artifact, Cardinality, Dispatcher, EphemeralStore, Operation, OperationRegistry,
    ResolvedParams, ResourceLedger,
};
use tempfile::TempDir;

use common::{assert_no_leaks, pdf, pdf_input};

/// Pins down the closure signature so it satisfies the handler bound.
fn handler<F>(f: F) -> F
where
    F: Fn(&[Artifact], &ResolvedParams, &mut ResourceLedger) -> Result<Vec<Artifact>>
        + Send
        + Sync,
{
    f
}

/// Two outputs with the same display name cannot share one archive.
fn duplicate_pages(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let bytes = ledger.read(&inputs[0])?;
    Ok(vec![
        ledger.allocate("page.pdf", MediaType::Pdf, &bytes)?,
        ledger.allocate("page.pdf", MediaType::Pdf, &bytes)?,
    ])
}

fn register(registry: &mut OperationRegistry, operation: Operation) {
    registry.register(operation).unwrap();
}

fn scratch(tmp: &TempDir) -> PathBuf {
    tmp.path().join("scratch")
}

/// The one artifact file in the ledger's namespace whose name ends in `suffix`.
fn artifact_file(root: &Path, ledger: &ResourceLedger, suffix: &str) -> PathBuf {
    let dir = root.join(format!("ledger-{}", ledger.id()));
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| path.to_string_lossy().ends_with(suffix))
        .unwrap()
}

#[test]
fn packaging_failure_is_fatal_and_streams_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut registry = OperationRegistry::new();
    register(
        &mut registry,
        Operation::new(
            "duplicate",
            Arity::exactly(1),
            &[MediaType::Pdf],
            Cardinality::Multiple,
            MediaType::Pdf,
            "pages.zip",
            duplicate_pages,
        ),
    );
    let store = EphemeralStore::open(scratch(&tmp)).unwrap();
    let dispatcher = Dispatcher::with_parts(registry, store, AppConfig::default());

    let request = Request::new("duplicate").with_input(pdf_input("doc.pdf", pdf("Page", 1)));
    let mut sink = Vec::new();
    let err = dispatcher.dispatch_to(&request, &mut sink).unwrap_err();

    assert!(matches!(err, BlattwerkError::Resource { fatal: true, .. }), "{err}");
    assert!(sink.is_empty());
    // Input plus both pages; the archive was never allocated.
    assert_eq!(dispatcher.store().allocation_count(), 3);
    assert_no_leaks(&dispatcher);
}

#[test]
fn release_failure_does_not_mask_the_handler_error() {
    let tmp = TempDir::new().unwrap();
    let root = scratch(&tmp);
    let pinned_root = root.clone();

    let mut registry = OperationRegistry::new();
    register(
        &mut registry,
        Operation::new(
            "stuck",
            Arity::exactly(1),
            &[MediaType::Pdf],
            Cardinality::Single,
            MediaType::Pdf,
            "out.pdf",
            handler(move |_inputs, _params, ledger| {
                ledger.allocate("pinned.pdf", MediaType::Pdf, b"scratch")?;
                // A non-empty directory in place of the file cannot be
                // removed with remove_file.
                let path = artifact_file(&pinned_root, ledger, "-pinned.pdf");
                std::fs::remove_file(&path).unwrap();
                std::fs::create_dir(&path).unwrap();
                std::fs::write(path.join("pin"), b"pin").unwrap();
                Err(BlattwerkError::corrupt("page tree is unreadable"))
            }),
        ),
    );
    let store = EphemeralStore::open(&root).unwrap();
    let dispatcher = Dispatcher::with_parts(registry, store, AppConfig::default());

    let request = Request::new("stuck").with_input(pdf_input("doc.pdf", pdf("Page", 1)));
    let err = dispatcher.dispatch(&request).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert!(!err.is_retryable());
    // Only the pinned artifact and its ledger directory survive.
    let live = dispatcher.store().live_artifacts().unwrap();
    assert_eq!(live.len(), 2, "{live:?}");
    assert!(live.iter().any(|path| path.to_string_lossy().ends_with("-pinned.pdf")));
}
