// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF to Word conversion.
//
// The output is a minimal WordprocessingML package: one paragraph per text
// line, with a hard page break between source pages. Layout, fonts and
// images are not carried over.

use std::io::{Cursor, Write};

use blattwerk_core::error::{BlattwerkError, Result};
use tracing::{debug, info, instrument};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::pdf::reader::PdfReader;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Builds `.docx` packages from extracted page text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxWriter;

impl DocxWriter {
    pub fn new() -> Self {
        Self
    }

    /// Convert every page of `reader` into a Word document.
    #[instrument(skip_all, fields(pages = reader.page_count()))]
    pub fn convert_pdf(&self, reader: &PdfReader) -> Result<Vec<u8>> {
        let pages = reader.page_texts();
        info!(pages = pages.len(), "Converting PDF to DOCX");
        self.write_pages(&pages)
    }

    /// Assemble a package with one section of paragraphs per page.
    pub fn write_pages(&self, pages: &[String]) -> Result<Vec<u8>> {
        let body = document_xml(pages);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, contents) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/document.xml", body.as_str()),
        ] {
            zip.start_file(name, options).map_err(package_error)?;
            zip.write_all(contents.as_bytes())
                .map_err(|err| BlattwerkError::unsupported(format!("DOCX write failed: {err}")))?;
        }

        let output = zip.finish().map_err(package_error)?.into_inner();
        debug!(output_bytes = output.len(), "DOCX assembled");
        Ok(output)
    }
}

fn package_error(err: zip::result::ZipError) -> BlattwerkError {
    BlattwerkError::unsupported(format!("DOCX packaging failed: {err}"))
}

fn document_xml(pages: &[String]) -> String {
    let mut xml = String::from(DOCUMENT_HEAD);
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            xml.push_str(PAGE_BREAK);
        }
        for line in page.lines() {
            xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            xml.push_str(&escape_xml(line));
            xml.push_str("</w:t></w:r></w:p>");
        }
    }
    xml.push_str(DOCUMENT_TAIL);
    xml
}

/// Escape markup characters and drop code points XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push(' '),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
