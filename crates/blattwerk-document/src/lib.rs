// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document — The document engine behind Blattwerk operations.
//
// Provides PDF operations (merge, split, rotate, compress, repair, watermark,
// text extraction, password protection), PDF creation from images, page
// rasterisation, and DOCX emission. Every function is bytes-in/bytes-out and
// reports failures as typed handler errors.

pub mod convert;
pub mod image;
pub mod pdf;

// Re-export the primary structs so callers can use `blattwerk_document::PdfReader` etc.
pub use convert::DocxWriter;
pub use self::image::processor::ImageProcessor;
pub use pdf::reader::PdfReader;
pub use pdf::render::PageRasterizer;
pub use pdf::writer::PdfWriter;

#[cfg(test)]
pub(crate) mod fixtures;
