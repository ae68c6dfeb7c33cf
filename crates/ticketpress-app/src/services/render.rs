// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `render` command — read a request, run the batch, hand the document to a
// file sink and report the outcome.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use ticketpress_batch::{BatchScheduler, FileSink, TicketRequest, deliver};
use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::{BatchOutcome, PipelineConfig};
use tracing::{info, instrument};

/// What the command prints: the outcome plus where the document went.
#[derive(Debug, Serialize)]
pub struct RenderReport {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    pub written_to: Option<String>,
}

impl RenderReport {
    pub fn produced_document(&self) -> bool {
        self.written_to.is_some()
    }
}

/// Read the request at `input` (`-` for stdin).
pub fn read_request(input: &Path) -> Result<TicketRequest> {
    let data = if input == Path::new("-") {
        let mut data = String::new();
        std::io::stdin().read_to_string(&mut data)?;
        data
    } else {
        std::fs::read_to_string(input).map_err(|e| {
            TicketpressError::InvalidRequest(format!("cannot read {}: {e}", input.display()))
        })?
    };
    TicketRequest::from_value(serde_json::from_str(&data)?)
}

#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub async fn render(
    request: TicketRequest,
    out_dir: &Path,
    config: PipelineConfig,
) -> Result<RenderReport> {
    let scheduler = BatchScheduler::with_defaults(config)?;
    let outcome = scheduler.run(request.into_batch()).await?;

    let written_to = match &outcome.document {
        Some(document) => {
            let sink = FileSink::new(out_dir);
            Some(deliver(&sink, document)?)
        }
        None => None,
    };

    info!(
        batch_id = %outcome.batch_id,
        written_to = written_to.as_deref().unwrap_or("-"),
        "Render finished"
    );
    Ok(RenderReport {
        outcome,
        written_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket(reference: &str) -> serde_json::Value {
        json!({
            "event_title": "Launch Party",
            "event_date_time": "2026-06-12 19:30",
            "event_location": "Warehouse 9",
            "ticket_reference": reference,
            "ticket_type": "VIP",
            "ticket_price": "40.00",
        })
    }

    #[tokio::test]
    async fn batch_request_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("request.json");
        let request = json!({ "tickets": [ticket("A"), { "ticket_reference": "B" }, ticket("C")] });
        std::fs::write(&input, request.to_string()).unwrap();

        let report = render(read_request(&input).unwrap(), dir.path(), PipelineConfig::default())
            .await
            .unwrap();

        assert!(report.produced_document());
        assert!(dir.path().join("tickets_A_to_C.pdf").exists());
        assert_eq!(report.outcome.errors.len(), 1);
        assert_eq!(report.outcome.errors[0].reference.as_deref(), Some("B"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["document"]["page_count"], 2);
        assert_eq!(json["stats"]["submitted"], 3);
        assert!(json["document"].get("bytes").is_none());
    }

    #[tokio::test]
    async fn nothing_valid_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = TicketRequest::from_value(json!({ "ticket": { "reference": "X" } })).unwrap();

        let report = render(request, dir.path(), PipelineConfig::default())
            .await
            .unwrap();
        assert!(!report.produced_document());
        assert!(report.outcome.failure.is_some());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversized_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            max_batch_size: 1,
            ..PipelineConfig::default()
        };
        let request = TicketRequest::from_value(json!([ticket("A"), ticket("B")])).unwrap();
        let err = render(request, dir.path(), config).await.unwrap_err();
        assert!(matches!(err, TicketpressError::BatchTooLarge { .. }));
    }

    #[test]
    fn unreadable_input_is_invalid_request() {
        let err = read_request(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.is_fatal());
    }
}
