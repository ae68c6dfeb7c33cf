// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Passed explicitly into the scheduler; nothing here
// is read from process-wide state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TicketpressError};

/// Limits and tuning for one batch pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard upper bound on tickets per request.
    pub max_batch_size: usize,
    /// Number of records processed simultaneously.
    pub concurrency: usize,
    /// Images at or below this size are passed through untouched.
    pub max_image_bytes: usize,
    /// Longest allowed edge, in pixels, after normalisation.
    pub max_image_dimension: u32,
    /// JPEG quality used when re-encoding (1-100).
    pub jpeg_quality: u8,
    /// Timeout for a single image fetch.
    pub fetch_timeout_secs: u64,
    /// Overall batch deadline. Pages finished before it are still composed.
    pub batch_deadline_secs: Option<u64>,
    /// Page size used when the request does not override it.
    pub paper_size: crate::PaperSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            concurrency: 4,
            max_image_bytes: 512 * 1024,
            max_image_dimension: 1200,
            jpeg_quality: 80,
            fetch_timeout_secs: 10,
            batch_deadline_secs: Some(60),
            paper_size: crate::PaperSize::Ticket,
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(TicketpressError::Config("max_batch_size must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(TicketpressError::Config("concurrency must be at least 1".into()));
        }
        if self.max_image_bytes == 0 || self.max_image_dimension == 0 {
            return Err(TicketpressError::Config(
                "image byte and dimension ceilings must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(TicketpressError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(TicketpressError::Config("fetch_timeout_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }

    /// Concurrency for one batch: a request may lower it, never raise it.
    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n.min(self.concurrency),
            _ => self.concurrency,
        }
    }
}
