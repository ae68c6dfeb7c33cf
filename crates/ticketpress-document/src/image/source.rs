// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image sources — fetch remote artwork and QR codes by URL.
//
// The pipeline only depends on the `ImageSource` trait; `HttpImageSource` is
// the default network-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use ticketpress_core::error::{Result, TicketpressError};
use tracing::{debug, instrument, warn};

/// Refuse bodies larger than this regardless of the normalisation budget.
pub const MAX_FETCH_BYTES: usize = 20 * 1024 * 1024;

/// Raw bytes plus the MIME type the remote side declared.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Pluggable fetch-by-reference.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// Fetches images over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: Client,
    timeout: Duration,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ticketpress/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TicketpressError::Fetch(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    #[instrument(skip(self), fields(timeout_secs = self.timeout.as_secs()))]
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TicketpressError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Image fetch returned non-success status");
            return Err(TicketpressError::Fetch(format!("{url}: HTTP {status}")));
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type)
            .unwrap_or_default();
        if !is_image_media_type(&mime) {
            return Err(TicketpressError::UnsupportedMedia(format!(
                "{url}: content type {:?} is not an image",
                mime
            )));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_FETCH_BYTES
        {
            return Err(TicketpressError::Fetch(format!(
                "{url}: body of {len} bytes exceeds {MAX_FETCH_BYTES}"
            )));
        }

        // Chunk by chunk, so a body without an honest length stops at the cap.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TicketpressError::Fetch(format!("{url}: reading body: {e}")))?
        {
            if bytes.len() + chunk.len() > MAX_FETCH_BYTES {
                warn!(received = bytes.len() + chunk.len(), "Image body over the size cap, aborting");
                return Err(TicketpressError::Fetch(format!(
                    "{url}: body exceeds {MAX_FETCH_BYTES} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(bytes_len = bytes.len(), %mime, "Image downloaded");
        Ok(FetchedImage { bytes, mime })
    }
}

/// Strip parameters from a Content-Type value: `"Image/PNG; q=1"` → `"image/png"`.
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a media type belongs to the `image/*` family.
pub fn is_image_media_type(mime: &str) -> bool {
    mime.strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}
