// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Handlers — bind each registered operation to the document engine.
//
// Every handler reads its inputs through the ledger, calls into
// `blattwerk-document`, and allocates its outputs through the same ledger.
// Multi-output handlers name their artifacts `page_<n>.<ext>`, 1-indexed.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{MediaType, PaperSize};
use blattwerk_document::pdf::security;
use blattwerk_document::{DocxWriter, ImageProcessor, PageRasterizer, PdfReader, PdfWriter};
use tracing::{debug, instrument};

use crate::artifact::Artifact;
use crate::ledger::ResourceLedger;
use crate::params::ResolvedParams;
use crate::registry::Handler;

fn load_pdf(ledger: &ResourceLedger, artifact: &Artifact) -> Result<PdfReader> {
    PdfReader::from_bytes(&ledger.read(artifact)?)
}

fn single(
    ledger: &mut ResourceLedger,
    name: &str,
    media_type: MediaType,
    bytes: &[u8],
) -> Result<Vec<Artifact>> {
    Ok(vec![ledger.allocate(name, media_type, bytes)?])
}

fn per_page(
    ledger: &mut ResourceLedger,
    media_type: MediaType,
    pages: Vec<Vec<u8>>,
) -> Result<Vec<Artifact>> {
    if pages.is_empty() {
        return Err(BlattwerkError::unsupported("document has no pages"));
    }
    pages
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            let name = format!("page_{}.{}", index + 1, media_type.extension());
            ledger.allocate(name, media_type, bytes)
        })
        .collect()
}

// -- PDF restructuring --------------------------------------------------------

/// Concatenate all inputs in order.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let Some((first, rest)) = inputs.split_first() else {
        return Ok(Vec::new());
    };
    let base = load_pdf(ledger, first)?;
    let others = rest
        .iter()
        .map(|artifact| ledger.read(artifact))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&[u8]> = others.iter().map(Vec::as_slice).collect();
    let merged = base.merge(&refs)?;
    single(ledger, "merged.pdf", MediaType::Pdf, &merged)
}

/// One single-page PDF per page.
pub fn split(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let reader = load_pdf(ledger, &inputs[0])?;
    let pages = reader.split_pages()?;
    debug!(pages = pages.len(), "split into pages");
    per_page(ledger, MediaType::Pdf, pages)
}

pub fn compress(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let compressed = load_pdf(ledger, &inputs[0])?.compress()?;
    debug!(
        before = inputs[0].size(),
        after = compressed.len(),
        "compressed"
    );
    single(ledger, "compressed.pdf", MediaType::Pdf, &compressed)
}

pub fn rotate(
    inputs: &[Artifact],
    params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let degrees = params.angle("angle")?;
    let rotated = load_pdf(ledger, &inputs[0])?.rotate_all(degrees)?;
    single(ledger, "rotated.pdf", MediaType::Pdf, &rotated)
}

/// Stamp the second input's first page over every page of the first.
pub fn watermark(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let reader = load_pdf(ledger, &inputs[0])?;
    let stamp = ledger.read(&inputs[1])?;
    let stamped = reader.watermark(&stamp)?;
    single(ledger, "watermarked.pdf", MediaType::Pdf, &stamped)
}

pub fn repair(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let repaired = PdfReader::repair(&ledger.read(&inputs[0])?)?;
    single(ledger, "repaired.pdf", MediaType::Pdf, &repaired)
}

// -- Security -----------------------------------------------------------------

pub fn protect(
    inputs: &[Artifact],
    params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let protected = security::protect(&ledger.read(&inputs[0])?, params.password("password")?)?;
    single(ledger, "protected.pdf", MediaType::Pdf, &protected)
}

pub fn unlock(
    inputs: &[Artifact],
    params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let unlocked = security::unlock(&ledger.read(&inputs[0])?, params.password("password")?)?;
    single(ledger, "unlocked.pdf", MediaType::Pdf, &unlocked)
}

// -- Conversion ---------------------------------------------------------------

pub fn extract_text(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let text = load_pdf(ledger, &inputs[0])?.extract_text()?;
    single(ledger, "extracted.txt", MediaType::PlainText, text.as_bytes())
}

pub fn pdf_to_word(
    inputs: &[Artifact],
    _params: &ResolvedParams,
    ledger: &mut ResourceLedger,
) -> Result<Vec<Artifact>> {
    let reader = load_pdf(ledger, &inputs[0])?;
    let docx = DocxWriter::new().convert_pdf(&reader)?;
    single(ledger, "document.docx", MediaType::Docx, &docx)
}

/// Rasterise every page to PNG.
#[derive(Debug, Clone, Copy)]
pub struct PdfToImages {
    pub dpi: u32,
}

impl Handler for PdfToImages {
    fn run(
        &self,
        inputs: &[Artifact],
        _params: &ResolvedParams,
        ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>> {
        let reader = load_pdf(ledger, &inputs[0])?;
        let pages = PageRasterizer::new(self.dpi).render_pages(&reader)?;
        per_page(ledger, MediaType::Png, pages)
    }
}

/// Lay each image out on its own page.
#[derive(Debug, Clone, Copy)]
pub struct ImagesToPdf {
    pub paper_size: PaperSize,
}

impl Handler for ImagesToPdf {
    fn run(
        &self,
        inputs: &[Artifact],
        _params: &ResolvedParams,
        ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>> {
        let images = inputs
            .iter()
            .map(|artifact| {
                ImageProcessor::from_typed_bytes(&ledger.read(artifact)?, artifact.media_type())
            })
            .collect::<Result<Vec<_>>>()?;
        let pdf = PdfWriter::new(self.paper_size).create_from_processors(images)?;
        single(ledger, "images.pdf", MediaType::Pdf, &pdf)
    }
}
