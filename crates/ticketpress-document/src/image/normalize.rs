// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image normalisation — bound artwork and QR codes to a byte and pixel
// budget before they are placed on a page.
//
// Loading (base64 decode or fetch) and normalising are separate steps so the
// caller can run the CPU-bound half on a blocking thread. Neither step fails
// a ticket: problems come back as a `degraded` reason alongside whatever
// bytes are still usable.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::{ImageAsset, ImageRef, PipelineConfig};
use tracing::{debug, info, instrument, warn};

use super::processor::{ImageProcessor, header_dimensions, sniff_mime};
use super::source::ImageSource;

/// Smallest longer edge we shrink to while chasing the byte budget.
const MIN_EDGE_PX: u32 = 16;

const JPEG_MIME: &str = "image/jpeg";

/// Encoded bytes obtained from a reference, before normalisation.
#[derive(Debug)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub declared_mime: Option<String>,
}

/// Result of normalising one asset.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Bytes to place on the page; `None` when nothing usable was obtained.
    pub asset: Option<ImageAsset>,
    /// Why optimisation was skipped, if it was.
    pub degraded: Option<String>,
}

/// Applies the byte and dimension ceilings.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_bytes: usize,
    max_dimension: u32,
    quality: u8,
}

impl ImageNormalizer {
    pub fn new(max_bytes: usize, max_dimension: u32, quality: u8) -> Self {
        Self {
            max_bytes,
            max_dimension,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_image_bytes,
            config.max_image_dimension,
            config.jpeg_quality,
        )
    }

    // -- Loading --------------------------------------------------------------

    /// Turn a reference into encoded bytes: decode inline payloads, fetch
    /// URLs through `source`, pass raw bytes through.
    #[instrument(skip_all, fields(reference = %reference.describe()))]
    pub async fn load(&self, reference: &ImageRef, source: &dyn ImageSource) -> Result<LoadedImage> {
        match reference {
            ImageRef::Inline { mime, payload } => Ok(LoadedImage {
                bytes: decode_base64(payload)?,
                declared_mime: mime.clone(),
            }),
            ImageRef::Url(url) => {
                let fetched = source.fetch(url).await?;
                debug!(bytes_len = fetched.bytes.len(), mime = %fetched.mime, "Image fetched");
                Ok(LoadedImage {
                    bytes: fetched.bytes,
                    declared_mime: Some(fetched.mime),
                })
            }
            ImageRef::Bytes(bytes) => Ok(LoadedImage {
                bytes: bytes.clone(),
                declared_mime: None,
            }),
        }
    }

    // -- Normalisation (CPU-bound) ----------------------------------------------

    /// Bound `loaded` to the configured budget.
    ///
    /// Bytes already within `max_bytes` are returned untouched; only their
    /// header is read. Larger images are downscaled, flattened to RGB and
    /// re-encoded as JPEG. On any codec failure the original bytes are kept
    /// and the reason is reported as degraded.
    #[instrument(skip_all, fields(bytes_len = loaded.bytes.len()))]
    pub fn normalize_bytes(&self, loaded: LoadedImage) -> Normalized {
        let LoadedImage {
            bytes,
            declared_mime,
        } = loaded;

        let sniffed = sniff_mime(&bytes);
        let mime = sniffed
            .map(str::to_owned)
            .or(declared_mime)
            .unwrap_or_else(|| "application/octet-stream".to_owned());

        if bytes.len() <= self.max_bytes {
            if sniffed.is_none() {
                warn!("Payload is not a recognised image format");
                return Normalized {
                    asset: None,
                    degraded: Some("image payload is not a recognised image format".into()),
                };
            }
            let dimensions = header_dimensions(&bytes);
            debug!(?dimensions, "Image within byte budget, passing through");
            return Normalized {
                asset: Some(ImageAsset {
                    bytes,
                    mime,
                    dimensions,
                }),
                degraded: None,
            };
        }

        match self.reencode(&bytes) {
            Ok(asset) => {
                info!(
                    from_bytes = bytes.len(),
                    to_bytes = asset.bytes.len(),
                    dimensions = ?asset.dimensions,
                    "Image re-encoded"
                );
                Normalized {
                    asset: Some(asset),
                    degraded: None,
                }
            }
            Err(err) => {
                warn!(%err, "Image optimisation skipped, using original bytes");
                let dimensions = header_dimensions(&bytes);
                Normalized {
                    asset: Some(ImageAsset {
                        bytes,
                        mime,
                        dimensions,
                    }),
                    degraded: Some(format!("image optimisation skipped: {err}")),
                }
            }
        }
    }

    fn reencode(&self, bytes: &[u8]) -> Result<ImageAsset> {
        let mut processor = ImageProcessor::from_bytes(bytes)?
            .fit_within(self.max_dimension)
            .flatten();

        loop {
            let dimensions = (processor.width(), processor.height());
            let jpeg = processor.to_jpeg_bytes(self.quality)?;
            if jpeg.len() <= self.max_bytes {
                return Ok(ImageAsset {
                    bytes: jpeg,
                    mime: JPEG_MIME.to_owned(),
                    dimensions: Some(dimensions),
                });
            }
            debug!(
                encoded = jpeg.len(),
                budget = self.max_bytes,
                "Still over budget, halving"
            );
            processor = processor.halve(MIN_EDGE_PX).ok_or_else(|| {
                TicketpressError::ImageError(format!(
                    "cannot fit image under {} bytes",
                    self.max_bytes
                ))
            })?;
        }
    }
}

/// Decode a base64 payload, tolerating embedded whitespace and missing
/// padding.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(TicketpressError::ImageError("empty inline image payload".into()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .or_else(|_| STANDARD_NO_PAD.decode(compact.as_bytes()))
        .map_err(|err| TicketpressError::ImageError(format!("invalid base64 image payload: {err}")))
}
