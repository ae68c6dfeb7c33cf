// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ticketpress-document — Document processing for the Ticketpress pipeline.
//
// Provides image normalisation (fetch, decode, downscale, flatten, re-encode),
// the page renderer contract with a printpdf-based ticket layout, and the
// lopdf-based composer that merges single-page renders into one document.

pub mod image;
pub mod pdf;

// Re-export the primary structs so callers can use `ticketpress_document::DocumentComposer` etc.
pub use image::normalize::ImageNormalizer;
pub use image::processor::ImageProcessor;
pub use image::source::{HttpImageSource, ImageSource};
pub use pdf::composer::DocumentComposer;
pub use pdf::renderer::{PageRenderer, PdfTicketRenderer};
