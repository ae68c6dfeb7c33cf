// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, downscale, flatten transparency and re-encode
// ticket artwork and QR codes. Operates on in-memory images using the
// `image` crate.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use ticketpress_core::error::TicketpressError;
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// so steps chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&png)?
///     .fit_within(1200)
///     .flatten()
///     .to_jpeg_bytes(80)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, TicketpressError> {
        let img = image::load_from_memory(data).map_err(|err| {
            TicketpressError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            color = ?img.color(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether the image carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Shrink so neither edge exceeds `max_dimension`, preserving aspect
    /// ratio. Images already within bounds are returned unchanged; this
    /// never upsamples.
    #[instrument(skip(self), fields(max_dimension))]
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        if w <= max_dimension && h <= max_dimension {
            return self;
        }
        let resized = self
            .image
            .resize(max_dimension, max_dimension, FilterType::Lanczos3);
        debug!(
            from_w = w,
            from_h = h,
            new_w = resized.width(),
            new_h = resized.height(),
            "Downscaled image"
        );
        Self { image: resized }
    }

    /// Halve both edges (aspect preserved), stopping at `floor` pixels on the
    /// longer edge. Returns `None` once the floor is reached.
    pub fn halve(self, floor: u32) -> Option<Self> {
        let longest = self.image.width().max(self.image.height());
        if longest / 2 < floor {
            return None;
        }
        let target = longest / 2;
        Some(Self {
            image: self.image.resize(target, target, FilterType::Triangle),
        })
    }

    /// Composite onto a white background and drop to three-channel RGB.
    ///
    /// PDF viewers disagree on soft-mask handling, so transparent artwork is
    /// flattened before it reaches a page.
    pub fn flatten(self) -> Self {
        if !self.has_alpha() {
            return Self {
                image: DynamicImage::ImageRgb8(self.image.to_rgb8()),
            };
        }

        let rgba = self.image.to_rgba8();
        let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let alpha = a as u32;
            let blend = |channel: u8| -> u8 {
                ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
            };
            Rgb([blend(r), blend(g), blend(b)])
        });
        Self {
            image: DynamicImage::ImageRgb8(flattened),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, TicketpressError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder).map_err(|err| {
            TicketpressError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, TicketpressError> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|err| TicketpressError::ImageError(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

/// Read pixel dimensions from the header only, without decoding pixels.
pub fn header_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// MIME type sniffed from the magic bytes, if recognised.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|f| f.to_mime_type())
}
