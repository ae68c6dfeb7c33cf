// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outcome reporter — collects per-record problems while a batch runs and
// turns them into the `BatchOutcome` handed back to the caller.

use std::collections::BTreeSet;

use ticketpress_core::{BatchId, BatchOutcome, BatchStats, ComposedDocument, ErrorKind, RecordError};
use tracing::{info, warn};

/// Accumulates errors for one batch. Never fails.
#[derive(Debug)]
pub struct OutcomeReporter {
    batch_id: BatchId,
    submitted: usize,
    errors: Vec<RecordError>,
}

impl OutcomeReporter {
    pub fn new(batch_id: BatchId, submitted: usize) -> Self {
        Self {
            batch_id,
            submitted,
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, error: RecordError) {
        warn!(
            position = error.position,
            reference = error.reference.as_deref().unwrap_or("-"),
            kind = ?error.kind,
            reason = %error.reason,
            "Record problem"
        );
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = RecordError>) {
        for error in errors {
            self.record(error);
        }
    }

    /// Positions excluded from the document so far.
    pub fn excluded_positions(&self) -> BTreeSet<usize> {
        self.errors
            .iter()
            .filter(|e| e.kind.excludes_record())
            .map(|e| e.position)
            .collect()
    }

    /// Pages that rendered but were lost when the document could not be
    /// assembled. Each becomes a `RenderFailed` error for its position.
    pub fn composition_failed(&mut self, included: &[(usize, String)], reason: &str) {
        for (position, reference) in included {
            self.record(RecordError::new(
                *position,
                Some(reference.clone()),
                ErrorKind::RenderFailed,
                format!("document composition failed: {reason}"),
            ));
        }
    }

    /// Build the outcome. `failure` explains a missing document.
    pub fn finish(mut self, document: Option<ComposedDocument>, failure: Option<String>) -> BatchOutcome {
        // Stable: a record's own errors keep the order they were raised in.
        self.errors.sort_by_key(|e| e.position);

        let excluded = self.excluded_positions();
        let degraded: BTreeSet<usize> = self
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::AssetDegraded && !excluded.contains(&e.position))
            .map(|e| e.position)
            .collect();
        let timed_out = self
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::TimedOut)
            .count();

        let stats = BatchStats {
            submitted: self.submitted,
            accepted: document.as_ref().map_or(0, |d| d.page_count),
            rejected: excluded.len(),
            degraded: degraded.len(),
            timed_out,
        };

        info!(
            batch_id = %self.batch_id,
            submitted = stats.submitted,
            accepted = stats.accepted,
            rejected = stats.rejected,
            degraded = stats.degraded,
            timed_out = stats.timed_out,
            "Batch finished"
        );

        BatchOutcome {
            batch_id: self.batch_id,
            document,
            errors: self.errors,
            stats,
            failure,
        }
    }
}
