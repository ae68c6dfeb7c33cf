// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — loading, fetching, downscaling and re-encoding of ticket
// artwork and QR codes.

pub mod normalize;
pub mod processor;
pub mod source;

pub use normalize::{ImageNormalizer, LoadedImage, Normalized};
pub use processor::ImageProcessor;
pub use source::{FetchedImage, HttpImageSource, ImageSource};
