// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inbound request shapes: a batch of raw ticket records, or a single ticket
// with explicit numbering. Records stay as raw JSON until validation so one
// malformed ticket cannot fail deserialisation of the whole request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::PaperSize;

/// Page format override, CSS-style lengths (`"180mm"`, `"7in"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width: String,
    pub height: String,
}

impl PageFormat {
    pub fn paper_size(&self) -> Result<PaperSize> {
        PaperSize::from_css_lengths(&self.width, &self.height)
    }
}

/// Many tickets, one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub tickets: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PageFormat>,
    /// Lowers the configured worker count for this batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

impl BatchRequest {
    pub fn new(tickets: Vec<Value>) -> Self {
        Self {
            tickets,
            ..Self::default()
        }
    }

    /// Page size for this batch, falling back to `default`.
    pub fn paper_size(&self, default: PaperSize) -> Result<PaperSize> {
        self.format
            .as_ref()
            .map_or(Ok(default), PageFormat::paper_size)
    }
}

/// One ticket rendered on its own, optionally numbered "n of m".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTicketRequest {
    pub ticket: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ticket: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tickets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PageFormat>,
}

impl SingleTicketRequest {
    /// A batch of one. Numbering overrides are written onto the record,
    /// where validation picks them up.
    pub fn into_batch(self) -> BatchRequest {
        let mut ticket = self.ticket;
        if let Value::Object(obj) = &mut ticket {
            if let Some(current) = self.current_ticket {
                obj.insert("current_ticket".into(), current.into());
            }
            if let Some(total) = self.total_tickets {
                obj.insert("total_tickets".into(), total.into());
            }
        }
        BatchRequest {
            tickets: vec![ticket],
            format: self.format,
            concurrency: None,
        }
    }
}

/// Either request shape.
#[derive(Debug, Clone)]
pub enum TicketRequest {
    Batch(BatchRequest),
    Single(SingleTicketRequest),
}

impl TicketRequest {
    /// Pick the shape from the top-level keys: `tickets` means a batch,
    /// `ticket` a single ticket. A bare array is a batch.
    pub fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Array(_) => Ok(Self::Batch(BatchRequest {
                tickets: serde_json::from_value(value)?,
                ..BatchRequest::default()
            })),
            Value::Object(obj) if obj.contains_key("tickets") => {
                if !obj["tickets"].is_array() {
                    return Err(TicketpressError::InvalidRequest(
                        "`tickets` must be an array".into(),
                    ));
                }
                Ok(Self::Batch(serde_json::from_value(value)?))
            }
            Value::Object(obj) if obj.contains_key("ticket") => {
                Ok(Self::Single(serde_json::from_value(value)?))
            }
            _ => Err(TicketpressError::InvalidRequest(
                "expected an object with `tickets` or `ticket`, or an array of tickets".into(),
            )),
        }
    }

    pub fn into_batch(self) -> BatchRequest {
        match self {
            Self::Batch(batch) => batch,
            Self::Single(single) => single.into_batch(),
        }
    }
}
