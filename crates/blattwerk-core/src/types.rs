// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: media types, requests constructed by front-ends, and the
// responses rendered back to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Media types accepted as input or produced as output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
    Bmp,
    Tiff,
    PlainText,
    /// Office Open XML word-processing document.
    Docx,
    /// Bundle of several output artifacts.
    Zip,
}

impl MediaType {
    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::PlainText => "text/plain",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Zip => "application/zip",
        }
    }

    /// Parse a MIME type string. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/tiff" => Some(Self::Tiff),
            "text/plain" => Some(Self::PlainText),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Infer the media type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "txt" => Some(Self::PlainText),
            "docx" => Some(Self::Docx),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::PlainText => "txt",
            Self::Docx => "docx",
            Self::Zip => "zip",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Bmp | Self::Tiff)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Standard paper sizes used when laying images out on PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// One uploaded input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBlob {
    /// Client-supplied file name (untrusted).
    pub name: String,
    /// Declared MIME type, validated against the operation contract.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl InputBlob {
    pub fn new(name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.mime_type().to_string(),
            bytes,
        }
    }
}

/// A transformation request, built entirely by a front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub operation: String,
    pub inputs: Vec<InputBlob>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Request {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, input: InputBlob) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sum of all input payload sizes.
    pub fn total_input_bytes(&self) -> u64 {
        self.inputs.iter().map(|i| i.bytes.len() as u64).sum()
    }
}

/// The downloadable result of a successful request.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
    pub media_type: MediaType,
}

/// Error payload returned to a front-end. Never contains storage paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// What a front-end renders: either the document or an error.
#[derive(Debug, Clone)]
pub enum Response {
    Delivered(Delivery),
    Failed(ErrorBody),
}

impl From<crate::error::Result<Delivery>> for Response {
    fn from(result: crate::error::Result<Delivery>) -> Self {
        match result {
            Ok(delivery) => Self::Delivered(delivery),
            Err(err) => Self::Failed(crate::human_errors::humanize_error(&err)),
        }
    }
}

/// Longest display name kept, in bytes. Artifact file names add a UUID
/// prefix and must stay under the 255-byte component limit.
pub const MAX_FILE_NAME_LEN: usize = 100;

/// Longest extension preserved when a name is shortened.
const MAX_EXTENSION_LEN: usize = 16;

/// Reduce an untrusted client file name to a safe display name.
///
/// Keeps only the final path component, drops control characters and
/// anything outside `[A-Za-z0-9._-]`, and strips leading dots so the result
/// can never name a parent or hidden entry. Names longer than
/// [`MAX_FILE_NAME_LEN`] are cut short, keeping a short extension. Falls back
/// to `"document"`.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        return "document".to_string();
    }
    if trimmed.len() <= MAX_FILE_NAME_LEN {
        return trimmed.to_string();
    }

    // Only ASCII survives the filter above, so byte offsets are char
    // boundaries.
    let extension = trimmed
        .rfind('.')
        .map(|dot| &trimmed[dot..])
        .filter(|ext| ext.len() <= MAX_EXTENSION_LEN)
        .unwrap_or("");
    let stem = &trimmed[..MAX_FILE_NAME_LEN - extension.len()];
    format!("{stem}{extension}")
}
