// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ticketpress.
//
// Only `BatchTooLarge` and `EmptyBatch` stop a batch from producing a
// response. Everything that goes wrong for a single record is carried as a
// `RecordError` value in the outcome instead of an `Err`.

use thiserror::Error;

/// Top-level error type for all Ticketpress operations.
#[derive(Debug, Error)]
pub enum TicketpressError {
    // -- Batch-level (fatal) --
    #[error("too many tickets: limit is {limit}, received {received}")]
    BatchTooLarge { limit: usize, received: usize },

    #[error("no valid tickets to generate ({submitted} submitted)")]
    EmptyBatch { submitted: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // -- Asset errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("image fetch failed: {0}")]
    Fetch(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    // -- Document errors --
    #[error("page render failed: {0}")]
    Render(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TicketpressError {
    /// Whether this error rejects the whole batch rather than one record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BatchTooLarge { .. } | Self::EmptyBatch { .. } | Self::InvalidRequest(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TicketpressError>;
