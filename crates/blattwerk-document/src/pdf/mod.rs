// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading, restructuring, encrypting, rendering, and creating PDFs.

pub mod reader;
pub mod render;
pub mod security;
pub mod writer;

pub use reader::PdfReader;
pub use render::PageRasterizer;
pub use writer::PdfWriter;
