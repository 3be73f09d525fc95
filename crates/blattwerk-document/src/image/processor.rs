// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode uploaded rasters (JPEG, PNG, BMP, TIFF) and
// encode rendered pages as PNG using the `image` crate.

use blattwerk_core::MediaType;
use blattwerk_core::error::{BlattwerkError, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::{debug, instrument};

/// A single in-memory image on its way into or out of a PDF.
#[derive(Debug)]
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes, sniffing the format.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| BlattwerkError::corrupt(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Decode bytes that were declared as `media_type`.
    ///
    /// The declared type picks the decoder, so a PNG labelled as JPEG is
    /// reported as corrupt rather than silently accepted.
    pub fn from_typed_bytes(data: &[u8], media_type: MediaType) -> Result<Self> {
        let Some(format) = image_format(media_type) else {
            return Err(BlattwerkError::unsupported(format!(
                "{} is not an image type",
                media_type
            )));
        };
        let img = image::load_from_memory_with_format(data, format).map_err(|err| {
            BlattwerkError::corrupt(format!("failed to decode {}: {}", media_type, err))
        })?;
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded RGB canvas.
    pub fn from_rgb(canvas: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(canvas),
        }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the pixels as 8-bit RGB.
    pub fn into_rgb8(self) -> RgbImage {
        self.image.to_rgb8()
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| BlattwerkError::unsupported(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

fn image_format(media_type: MediaType) -> Option<ImageFormat> {
    match media_type {
        MediaType::Jpeg => Some(ImageFormat::Jpeg),
        MediaType::Png => Some(ImageFormat::Png),
        MediaType::Bmp => Some(ImageFormat::Bmp),
        MediaType::Tiff => Some(ImageFormat::Tiff),
        _ => None,
    }
}
