// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation registry — typed descriptors for every operation Blattwerk can
// run, built once at startup and read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{AppConfig, MediaType};
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::handlers;
use crate::ledger::ResourceLedger;
use crate::params::{ParamSpec, ResolvedParams};

/// Media types accepted by operations that take images.
pub const IMAGE_INPUTS: [MediaType; 4] = [
    MediaType::Jpeg,
    MediaType::Png,
    MediaType::Bmp,
    MediaType::Tiff,
];

/// Work performed for one operation.
///
/// A handler receives the materialised inputs, the validated parameters and
/// the request's ledger. Every artifact it returns must have been allocated
/// through that same ledger.
pub trait Handler: Send + Sync {
    fn run(
        &self,
        inputs: &[Artifact],
        params: &ResolvedParams,
        ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>>;
}

impl<F> Handler for F
where
    F: Fn(&[Artifact], &ResolvedParams, &mut ResourceLedger) -> Result<Vec<Artifact>>
        + Send
        + Sync,
{
    fn run(
        &self,
        inputs: &[Artifact],
        params: &ResolvedParams,
        ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>> {
        self(inputs, params, ledger)
    }
}

/// Number of inputs an operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub fn admits(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {}", self.min),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// How many artifacts a handler yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one artifact, delivered as-is.
    Single,
    /// One or more artifacts, delivered as a single archive.
    Multiple,
}

/// A registered operation and its contract.
#[derive(Clone)]
pub struct Operation {
    pub name: String,
    pub arity: Arity,
    pub accepted: Vec<MediaType>,
    pub cardinality: Cardinality,
    /// Media type of a `Single` result; `Multiple` results are always zip.
    pub output: MediaType,
    pub suggested_filename: String,
    pub params: Vec<ParamSpec>,
    pub handler: Arc<dyn Handler>,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        accepted: &[MediaType],
        cardinality: Cardinality,
        output: MediaType,
        suggested_filename: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            accepted: accepted.to_vec(),
            cardinality,
            output,
            suggested_filename: suggested_filename.into(),
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Media type of what the caller receives.
    pub fn delivered_media_type(&self) -> MediaType {
        match self.cardinality {
            Cardinality::Single => self.output,
            Cardinality::Multiple => MediaType::Zip,
        }
    }

    pub fn accepts(&self, media_type: MediaType) -> bool {
        self.accepted.contains(&media_type)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("accepted", &self.accepted)
            .field("cardinality", &self.cardinality)
            .field("output", &self.output)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Name-keyed table of operations.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation Blattwerk ships, configured from `config`.
    pub fn standard(config: &AppConfig) -> Result<Self> {
        let pdf = [MediaType::Pdf];
        let mut registry = Self::new();

        registry.register(Operation::new(
            "merge",
            Arity::at_least(2),
            &pdf,
            Cardinality::Single,
            MediaType::Pdf,
            "merged.pdf",
            handlers::merge,
        ))?;
        registry.register(Operation::new(
            "split",
            Arity::exactly(1),
            &pdf,
            Cardinality::Multiple,
            MediaType::Pdf,
            "split_pages.zip",
            handlers::split,
        ))?;
        registry.register(Operation::new(
            "compress",
            Arity::exactly(1),
            &pdf,
            Cardinality::Single,
            MediaType::Pdf,
            "compressed.pdf",
            handlers::compress,
        ))?;
        registry.register(Operation::new(
            "pdf2img",
            Arity::exactly(1),
            &pdf,
            Cardinality::Multiple,
            MediaType::Png,
            "images.zip",
            handlers::PdfToImages {
                dpi: config.raster_dpi,
            },
        ))?;
        registry.register(Operation::new(
            "img2pdf",
            Arity::at_least(1),
            &IMAGE_INPUTS,
            Cardinality::Single,
            MediaType::Pdf,
            "images.pdf",
            handlers::ImagesToPdf {
                paper_size: config.paper_size,
            },
        ))?;
        registry.register(Operation::new(
            "pdf2word",
            Arity::exactly(1),
            &pdf,
            Cardinality::Single,
            MediaType::Docx,
            "document.docx",
            handlers::pdf_to_word,
        ))?;
        registry.register(
            Operation::new(
                "rotate",
                Arity::exactly(1),
                &pdf,
                Cardinality::Single,
                MediaType::Pdf,
                "rotated.pdf",
                handlers::rotate,
            )
            .with_param(ParamSpec::angle("angle")),
        )?;
        registry.register(Operation::new(
            "extractText",
            Arity::exactly(1),
            &pdf,
            Cardinality::Single,
            MediaType::PlainText,
            "extracted.txt",
            handlers::extract_text,
        ))?;
        registry.register(Operation::new(
            "watermark",
            Arity::exactly(2),
            &pdf,
            Cardinality::Single,
            MediaType::Pdf,
            "watermarked.pdf",
            handlers::watermark,
        ))?;
        registry.register(
            Operation::new(
                "protect",
                Arity::exactly(1),
                &pdf,
                Cardinality::Single,
                MediaType::Pdf,
                "protected.pdf",
                handlers::protect,
            )
            .with_param(ParamSpec::password("password")),
        )?;
        registry.register(
            Operation::new(
                "unlock",
                Arity::exactly(1),
                &pdf,
                Cardinality::Single,
                MediaType::Pdf,
                "unlocked.pdf",
                handlers::unlock,
            )
            .with_param(ParamSpec::password("password")),
        )?;
        registry.register(Operation::new(
            "repair",
            Arity::exactly(1),
            &pdf,
            Cardinality::Single,
            MediaType::Pdf,
            "repaired.pdf",
            handlers::repair,
        ))?;

        info!(operations = registry.len(), "operation registry built");
        Ok(registry)
    }

    /// Add an operation. Names are unique.
    pub fn register(&mut self, operation: Operation) -> Result<()> {
        if self.operations.contains_key(&operation.name) {
            return Err(BlattwerkError::validation(format!(
                "operation '{}' is already registered",
                operation.name
            )));
        }
        debug!(operation = %operation.name, arity = %operation.arity, "operation registered");
        self.operations.insert(operation.name.clone(), operation);
        Ok(())
    }

    /// Find an operation by name.
    pub fn lookup(&self, name: &str) -> Result<&Operation> {
        self.operations
            .get(name)
            .ok_or_else(|| BlattwerkError::NotFound(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
