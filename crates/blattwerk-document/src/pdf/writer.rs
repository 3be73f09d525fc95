// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — create new PDF documents from raster images using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use blattwerk_core::PaperSize;
use blattwerk_core::error::{BlattwerkError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;

/// Margin around each placed image.
const MARGIN_MM: f32 = 15.0;

/// Title recorded in the document metadata.
const DOCUMENT_TITLE: &str = "Blattwerk Images";

/// Native resolution assumed for uploaded images.
const IMAGE_DPI: f32 = 150.0;

/// Creates new PDF documents from raster images, one image per page.
pub struct PdfWriter {
    /// Paper size for page creation.
    paper_size: PaperSize,
}

impl PdfWriter {
    /// Create a new writer targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Create a PDF with one page per encoded image, in input order.
    ///
    /// The image format is sniffed from the bytes.
    pub fn create_from_images(&self, images: &[&[u8]]) -> Result<Vec<u8>> {
        let decoded = images
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                ImageProcessor::from_bytes(bytes).map_err(|err| {
                    BlattwerkError::corrupt(format!("image #{}: {}", index + 1, err))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.create_from_processors(decoded)
    }

    /// Create a PDF with one page per decoded image, in input order.
    ///
    /// Each image is scaled to fit within the page margins while preserving
    /// its aspect ratio, never upscaled, and centred.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn create_from_processors(&self, images: Vec<ImageProcessor>) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(BlattwerkError::unsupported_argument(
                "at least one image is required",
            ));
        }

        let (page_w, page_h) = self.page_dimensions();
        info!(paper = ?self.paper_size, "Creating image PDF");

        let mut doc = PdfDocument::new(DOCUMENT_TITLE);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(images.len());

        for (index, processor) in images.into_iter().enumerate() {
            let img_width = processor.width() as usize;
            let img_height = processor.height() as usize;

            // printpdf takes RGB8 pixel data.
            let raw = RawImage {
                pixels: RawImageData::U8(processor.into_rgb8().into_raw()),
                width: img_width,
                height: img_height,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let usable_w_pt = Mm(page_w.0 - 2.0 * MARGIN_MM).into_pt().0;
            let usable_h_pt = Mm(page_h.0 - 2.0 * MARGIN_MM).into_pt().0;

            let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
            let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;

            // Scale to fit while preserving aspect ratio; do not upscale.
            let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt).min(1.0);
            let rendered_w_pt = img_w_pt * scale;
            let rendered_h_pt = img_h_pt * scale;

            let margin_pt = Mm(MARGIN_MM).into_pt().0;
            let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
            let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x_offset)),
                    translate_y: Some(Pt(y_offset)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];

            debug!(page = index + 1, rendered_w_pt, rendered_h_pt, scale, "Image placed on page");
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(warnings = warnings.len(), output_bytes = output.len(), "Image PDF serialised");

        Ok(output)
    }
}
