// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasteriser — renders each PDF page to a PNG.
//
// Rendering is image-oriented: the page canvas is sized from its MediaBox at
// the configured DPI, and every image XObject painted by the page content is
// composited at the position its transformation matrix places it. Text and
// vector paths are not drawn. This covers scanned documents and image-based
// PDFs, which is what the image export is used for.
//
// Work happens in two phases: a sequential pass over the lopdf document
// collects an owned `PagePlan` per page, then plans are decoded, composited
// and encoded in parallel with rayon. Output order always matches page order.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use blattwerk_core::error::Result;
use tracing::{debug, info, instrument, warn};

use super::reader::{PdfReader, effective_resources, media_box, number, resolve};
use crate::image::ImageProcessor;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Upper bound on either canvas dimension, in pixels.
const MAX_CANVAS_PX: u32 = 10_000;

/// Rasterises PDF pages to PNG images.
pub struct PageRasterizer {
    dpi: u32,
}

impl Default for PageRasterizer {
    fn default() -> Self {
        Self::new(72)
    }
}

impl PageRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi: dpi.max(1) }
    }

    /// Render every page, returning PNG bytes per page in page order.
    #[instrument(skip_all, fields(dpi = self.dpi))]
    pub fn render_pages(&self, reader: &PdfReader) -> Result<Vec<Vec<u8>>> {
        let doc = reader.document();
        let plans: Vec<PagePlan> = doc
            .get_pages()
            .into_iter()
            .map(|(page_number, page_id)| plan_page(doc, page_number, page_id))
            .collect();

        info!(pages = plans.len(), "Rasterising pages");

        let scale = self.dpi as f32 / POINTS_PER_INCH;
        plans
            .into_par_iter()
            .map(|plan| plan.render(scale))
            .collect()
    }
}

/// Affine matrix `[a b c d e f]` as used by the PDF `cm` operator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// `self × base`: apply `self` first, then `base`.
    fn then(self, base: Self) -> Self {
        let [a, b, c, d, e, f] = self.0;
        let [ba, bb, bc, bd, be, bf] = base.0;
        Self([
            a * ba + b * bc,
            a * bb + b * bd,
            c * ba + d * bc,
            c * bb + d * bd,
            e * ba + f * bc + be,
            e * bb + f * bd + bf,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Axis-aligned bounds of the unit square under this matrix.
    fn unit_bounds(&self) -> [f32; 4] {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        let mut bounds = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        for (x, y) in corners {
            bounds[0] = bounds[0].min(x);
            bounds[1] = bounds[1].min(y);
            bounds[2] = bounds[2].max(x);
            bounds[3] = bounds[3].max(y);
        }
        bounds
    }
}

/// Encoded pixels of one image XObject.
enum ImageSource {
    /// DCT-encoded stream, decodable as JPEG.
    Jpeg(Vec<u8>),
    /// Decompressed 8-bit samples.
    Raw {
        width: u32,
        height: u32,
        components: u8,
        samples: Vec<u8>,
    },
}

struct Placement {
    source: ImageSource,
    /// `[x0, y0, x1, y1]` in user space.
    bounds: [f32; 4],
}

/// Everything needed to render one page without touching the document.
struct PagePlan {
    page_number: u32,
    media_box: [f32; 4],
    placements: Vec<Placement>,
}

fn plan_page(doc: &Document, page_number: u32, page_id: ObjectId) -> PagePlan {
    let mut plan = PagePlan {
        page_number,
        media_box: media_box(doc, page_id),
        placements: Vec::new(),
    };

    let content = match doc.get_and_decode_page_content(page_id) {
        Ok(content) => content,
        Err(err) => {
            warn!(page_number, %err, "page content unreadable, rendering blank page");
            return plan;
        }
    };

    let resources = effective_resources(doc, page_id);
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_dict().ok());

    let mut ctm = Matrix::IDENTITY;
    let mut saved: Vec<Matrix> = Vec::new();

    for operation in &content.operations {
        match operation.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => ctm = saved.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                let values: Vec<f32> = operation.operands.iter().filter_map(number).collect();
                if let Ok(m) = <[f32; 6]>::try_from(values.as_slice()) {
                    ctm = Matrix(m).then(ctm);
                }
            }
            "Do" => {
                let Some(Object::Name(name)) = operation.operands.first() else {
                    continue;
                };
                let stream = xobjects
                    .and_then(|dict| dict.get(name).ok())
                    .and_then(|value| resolve(doc, value))
                    .and_then(|value| value.as_stream().ok());
                if let Some(source) = stream.and_then(image_source) {
                    plan.placements.push(Placement {
                        source,
                        bounds: ctm.unit_bounds(),
                    });
                }
            }
            _ => {}
        }
    }

    debug!(page_number, images = plan.placements.len(), "Page planned");
    plan
}

/// Extract pixels from an image XObject, if it uses an encoding we handle.
fn image_source(stream: &Stream) -> Option<ImageSource> {
    let dict = &stream.dict;
    let is_image = dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|name| name == b"Image")
        .unwrap_or(false);
    if !is_image {
        return None;
    }

    let filters: Vec<Vec<u8>> = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    };
    if filters == [b"DCTDecode".to_vec()] {
        return Some(ImageSource::Jpeg(stream.content.clone()));
    }

    let width = dict.get(b"Width").and_then(Object::as_i64).ok()?;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()?;
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    let components = match dict.get(b"ColorSpace").and_then(Object::as_name) {
        Ok(b"DeviceRGB") => 3,
        Ok(b"DeviceGray") => 1,
        _ => return None,
    };
    if bits != 8 || width <= 0 || height <= 0 {
        return None;
    }

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().ok()?
    };
    Some(ImageSource::Raw {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        components,
        samples,
    })
}

impl ImageSource {
    fn decode(self) -> Option<RgbImage> {
        match self {
            Self::Jpeg(bytes) => image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                .ok()
                .map(|img| img.to_rgb8()),
            Self::Raw {
                width,
                height,
                components: 3,
                samples,
            } => RgbImage::from_raw(width, height, samples),
            Self::Raw {
                width,
                height,
                samples,
                ..
            } => GrayImage::from_raw(width, height, samples)
                .map(|gray| DynamicImage::ImageLuma8(gray).to_rgb8()),
        }
    }
}

impl PagePlan {
    fn render(self, scale: f32) -> Result<Vec<u8>> {
        let [x0, y0, x1, y1] = self.media_box;
        let width = (((x1 - x0) * scale).ceil() as u32).clamp(1, MAX_CANVAS_PX);
        let height = (((y1 - y0) * scale).ceil() as u32).clamp(1, MAX_CANVAS_PX);
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        for placement in self.placements {
            let [bx0, by0, bx1, by1] = placement.bounds;
            let target_w = ((bx1 - bx0) * scale).round() as u32;
            let target_h = ((by1 - by0) * scale).round() as u32;
            if target_w == 0 || target_h == 0 || target_w > MAX_CANVAS_PX || target_h > MAX_CANVAS_PX
            {
                continue;
            }
            let Some(pixels) = placement.source.decode() else {
                warn!(page_number = self.page_number, "undecodable image skipped");
                continue;
            };
            let resized = imageops::resize(&pixels, target_w, target_h, FilterType::Triangle);
            // PDF y grows upwards; image rows grow downwards.
            let left = ((bx0 - x0) * scale).round() as i64;
            let top = ((y1 - by1) * scale).round() as i64;
            imageops::overlay(&mut canvas, &resized, left, top);
        }

        ImageProcessor::from_rgb(canvas).to_png_bytes()
    }
}
