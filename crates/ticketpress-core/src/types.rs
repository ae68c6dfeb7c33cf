// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Ticketpress composition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TicketpressError};

/// Unique identifier for one batch invocation (used in log spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Page geometry ------------------------------------------------------------

/// Physical page size shared by every page of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaperSize {
    /// Landscape event ticket, 180 x 70 mm.
    #[default]
    Ticket,
    A4,
    A5,
    Letter,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::Ticket => (180, 70),
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Build a page size from CSS-style lengths such as `"180mm"` / `"7in"`.
    ///
    /// Recognises `mm`, `cm`, `in` and `pt`; a bare number is millimetres.
    /// Sizes matching the ticket format collapse to [`PaperSize::Ticket`].
    pub fn from_css_lengths(width: &str, height: &str) -> Result<Self> {
        let width_mm = parse_length_mm(width).ok_or_else(|| {
            TicketpressError::InvalidRequest(format!("invalid page width: {width:?}"))
        })?;
        let height_mm = parse_length_mm(height).ok_or_else(|| {
            TicketpressError::InvalidRequest(format!("invalid page height: {height:?}"))
        })?;

        let (width_mm, height_mm) = (width_mm.round() as u32, height_mm.round() as u32);
        if width_mm == 0 || height_mm == 0 {
            return Err(TicketpressError::InvalidRequest(format!(
                "page size must be non-zero, got {width_mm}x{height_mm}mm"
            )));
        }
        if (width_mm, height_mm) == Self::Ticket.dimensions_mm() {
            return Ok(Self::Ticket);
        }
        Ok(Self::Custom {
            width_mm,
            height_mm,
        })
    }
}

/// Parse a CSS-like length into millimetres.
fn parse_length_mm(value: &str) -> Option<f32> {
    let trimmed = value.trim().to_ascii_lowercase();
    let (number, factor) = if let Some(n) = trimmed.strip_suffix("mm") {
        (n, 1.0)
    } else if let Some(n) = trimmed.strip_suffix("cm") {
        (n, 10.0)
    } else if let Some(n) = trimmed.strip_suffix("in") {
        (n, 25.4)
    } else if let Some(n) = trimmed.strip_suffix("pt") {
        (n, 25.4 / 72.0)
    } else {
        (trimmed.as_str(), 1.0)
    };
    let parsed: f32 = number.trim().parse().ok()?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed * factor)
}

// -- Image references and assets ---------------------------------------------

/// Caller-supplied pointer to an image (event artwork or QR code).
#[derive(Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Base64 payload, either bare or from a `data:` URI.
    Inline { mime: Option<String>, payload: String },
    /// Remote image to be fetched.
    Url(String),
    /// Raw encoded bytes handed over directly by an in-process caller.
    Bytes(Vec<u8>),
}

impl ImageRef {
    /// Classify a textual reference. Returns `None` for blank input.
    ///
    /// No decoding happens here; malformed payloads surface later as
    /// degraded assets.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Some(Self::Url(trimmed.to_owned()));
        }

        if lower.starts_with("data:") {
            let (header, payload) = trimmed.split_once(',').unwrap_or((trimmed, ""));
            // "data:" is ASCII, so byte slicing is safe.
            let mime = header[5..]
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .map(|m| m.to_ascii_lowercase());
            return Some(Self::Inline {
                mime,
                payload: payload.to_owned(),
            });
        }

        Some(Self::Inline {
            mime: None,
            payload: trimmed.to_owned(),
        })
    }

    /// Short label for logs and error messages (never the payload itself).
    pub fn describe(&self) -> String {
        match self {
            Self::Inline { mime, payload } => format!(
                "inline {} ({} chars)",
                mime.as_deref().unwrap_or("base64"),
                payload.len()
            ),
            Self::Url(url) => format!("url {url}"),
            Self::Bytes(bytes) => format!("{} raw bytes", bytes.len()),
        }
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageRef({})", self.describe())
    }
}

/// Encoded image bytes ready to be placed on a page.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    /// Declared MIME type (`image/jpeg` after re-encoding).
    pub mime: String,
    /// Pixel dimensions, when the header could be read.
    pub dimensions: Option<(u32, u32)>,
}

impl std::fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAsset")
            .field("bytes_len", &self.bytes.len())
            .field("mime", &self.mime)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

// -- Ticket records -----------------------------------------------------------

/// Ticket price. Absent or null prices become `Free` at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Price {
    Free,
    Amount(String),
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "FREE"),
            Self::Amount(amount) => write!(f, "{amount}"),
        }
    }
}

/// When the event happens: caller text kept verbatim, or a UNIX timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M UTC")),
        }
    }
}

/// A validated, fully defaulted ticket ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    pub title: String,
    pub date_time: EventTime,
    pub location: String,
    /// Unique within the batch; never modified after validation.
    pub reference: String,
    pub ticket_type: String,
    pub price: Price,
    pub address: Option<String>,
    pub organizer: String,
    pub event_type: String,
    pub image: Option<ImageRef>,
    pub qr_code: Option<ImageRef>,
    /// 1-based position of this ticket within the batch.
    pub sequence: u32,
    pub batch_size: u32,
    pub generated_at: DateTime<Utc>,
}

/// Everything the renderer needs for one page.
#[derive(Debug, Clone)]
pub struct TicketPage {
    /// 1-based position in the submitted batch.
    pub position: usize,
    pub record: TicketRecord,
    pub image: Option<ImageAsset>,
    pub qr_code: Option<ImageAsset>,
    pub paper_size: PaperSize,
}

/// One rendered page, keyed by the record's original position.
#[derive(Clone)]
pub struct RenderedPage {
    /// 1-based position in the submitted batch.
    pub position: usize,
    pub reference: String,
    /// A standalone single-page PDF.
    pub pdf: Vec<u8>,
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("position", &self.position)
            .field("reference", &self.reference)
            .field("pdf_len", &self.pdf.len())
            .finish()
    }
}

/// The merged multi-page document handed to the document sink.
#[derive(Clone, Serialize)]
pub struct ComposedDocument {
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// References of the included tickets, in page order.
    pub references: Vec<String>,
    /// SHA-256 of `bytes`, lowercase hex.
    pub sha256: String,
}

impl std::fmt::Debug for ComposedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedDocument")
            .field("filename", &self.filename)
            .field("bytes_len", &self.bytes.len())
            .field("page_count", &self.page_count)
            .field("references", &self.references)
            .finish()
    }
}

// -- Outcomes -----------------------------------------------------------------

/// Classification of a per-record problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid field; record excluded.
    RecordRejected,
    /// Image optimisation skipped; record still rendered.
    AssetDegraded,
    /// Renderer failed; record excluded.
    RenderFailed,
    /// Batch deadline passed before the record finished; record excluded.
    TimedOut,
}

impl ErrorKind {
    /// Whether the record is excluded from the document.
    pub fn excludes_record(&self) -> bool {
        !matches!(self, Self::AssetDegraded)
    }
}

/// A problem attributed to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// 1-based position in the submitted batch.
    pub position: usize,
    pub reference: Option<String>,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RecordError {
    pub fn new(
        position: usize,
        reference: Option<String>,
        kind: ErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            position,
            reference,
            kind,
            reason: reason.into(),
        }
    }
}

/// Result of validating one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(Box<TicketRecord>),
    Rejected(RecordError),
}

/// Batch-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub submitted: usize,
    /// Records whose page is in the composed document.
    pub accepted: usize,
    /// Records excluded from the document for any reason.
    pub rejected: usize,
    /// Records rendered with at least one unoptimised or missing asset.
    pub degraded: usize,
    /// Records abandoned at the batch deadline.
    pub timed_out: usize,
}

/// Everything a caller gets back from one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub document: Option<ComposedDocument>,
    /// Per-record problems, ordered by position.
    pub errors: Vec<RecordError>,
    pub stats: BatchStats,
    /// Why no document was produced, if none was.
    pub failure: Option<String>,
}

impl BatchOutcome {
    /// True when every record succeeded without degradation.
    pub fn is_clean(&self) -> bool {
        self.document.is_some() && self.errors.is_empty()
    }

    /// Errors that excluded a record from the document.
    pub fn rejections(&self) -> impl Iterator<Item = &RecordError> {
        self.errors.iter().filter(|e| e.kind.excludes_record())
    }
}
