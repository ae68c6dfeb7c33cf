// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record validation — turns one caller-supplied JSON object into a fully
// defaulted `TicketRecord`, or a rejection attributed to its position.
//
// Pure: no network or filesystem access. Image references are classified
// here but only decoded or fetched later, for accepted records.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{
    ErrorKind, EventTime, ImageRef, Price, RecordError, TicketRecord, ValidationOutcome,
};

/// Placeholder used when the caller gives no organiser.
pub const DEFAULT_ORGANIZER: &str = "Event Organizer";

/// Event type used when the caller gives none.
pub const DEFAULT_EVENT_TYPE: &str = "EVENT";

// Accepted keys per field, long form first.
const TITLE: &[&str] = &["event_title", "title"];
const DATE_TIME: &[&str] = &["event_date_time", "event_date", "date"];
const LOCATION: &[&str] = &["event_location", "location"];
const REFERENCE: &[&str] = &["ticket_reference", "reference"];
const TICKET_TYPE: &[&str] = &["ticket_type", "type"];
const PRICE: &[&str] = &["ticket_price", "price"];
const ADDRESS: &[&str] = &["event_address", "address"];
const ORGANIZER: &[&str] = &["organizer_name", "organizer"];
const EVENT_TYPE: &[&str] = &["event_type"];
const IMAGE: &[&str] = &["event_image_url", "event_image", "image"];
const QR_CODE: &[&str] = &["qr_code_url", "qr_code", "qr"];
const CURRENT_TICKET: &[&str] = &["current_ticket"];
const TOTAL_TICKETS: &[&str] = &["total_tickets"];

/// Batch-wide values injected into every record.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext {
    pub batch_size: usize,
    pub generated_at: DateTime<Utc>,
}

impl BatchContext {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            generated_at: Utc::now(),
        }
    }
}

/// Validate the record at 1-based `position`.
pub fn validate(raw: &Value, position: usize, ctx: &BatchContext) -> ValidationOutcome {
    let Some(obj) = raw.as_object() else {
        return reject(position, None, "record is not an object");
    };

    // Looked up first so every rejection can name the record.
    let reference = match text(obj, REFERENCE) {
        Text::Present(r) => Some(r),
        _ => None,
    };

    let mut problems = Problems::default();

    let title = problems.require(obj, TITLE, "title");
    let date_time = match lookup(obj, DATE_TIME) {
        Some(Value::Number(n)) => {
            let ts = n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0));
            if ts.is_none() {
                problems.invalid.push("date");
            }
            ts.map(EventTime::Timestamp)
        }
        _ => problems.require(obj, DATE_TIME, "date").map(EventTime::Text),
    };
    let location = problems.require(obj, LOCATION, "location");
    let reference_checked = problems.require(obj, REFERENCE, "reference");
    let ticket_type = problems.require(obj, TICKET_TYPE, "ticket type");

    let price = match lookup(obj, PRICE) {
        None | Some(Value::Bool(false)) => Some(Price::Free),
        Some(Value::String(s)) if s.trim().is_empty() => Some(Price::Free),
        Some(Value::String(s)) => Some(Price::Amount(s.trim().to_owned())),
        Some(Value::Number(n)) => Some(Price::Amount(n.to_string())),
        Some(_) => {
            problems.invalid.push("price");
            None
        }
    };

    let image = image_ref(obj, IMAGE).unwrap_or_else(|()| {
        problems.invalid.push("image reference");
        None
    });
    let qr_code = image_ref(obj, QR_CODE).unwrap_or_else(|()| {
        problems.invalid.push("QR code reference");
        None
    });

    if let Some(reason) = problems.reason() {
        return reject(position, reference, reason);
    }

    // Every required field is present past this point.
    let (Some(title), Some(date_time), Some(location), Some(reference), Some(ticket_type), Some(price)) =
        (title, date_time, location, reference_checked, ticket_type, price)
    else {
        return reject(position, None, "record could not be validated");
    };

    let sequence = positive_int(obj, CURRENT_TICKET).unwrap_or(position as u32);
    let batch_size = positive_int(obj, TOTAL_TICKETS).unwrap_or(ctx.batch_size as u32);

    let record = TicketRecord {
        title,
        date_time,
        location,
        reference,
        ticket_type,
        price,
        address: optional_text(obj, ADDRESS),
        organizer: optional_text(obj, ORGANIZER).unwrap_or_else(|| DEFAULT_ORGANIZER.to_owned()),
        event_type: optional_text(obj, EVENT_TYPE).unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_owned()),
        image,
        qr_code,
        sequence,
        batch_size,
        generated_at: ctx.generated_at,
    };

    debug!(position, reference = %record.reference, "record accepted");
    ValidationOutcome::Accepted(Box::new(record))
}

/// Best-effort reference of a raw record, for naming records that never
/// finished validation.
pub fn reference_hint(raw: &Value) -> Option<String> {
    optional_text(raw.as_object()?, REFERENCE)
}

fn reject(position: usize, reference: Option<String>, reason: impl Into<String>) -> ValidationOutcome {
    ValidationOutcome::Rejected(RecordError::new(
        position,
        reference,
        ErrorKind::RecordRejected,
        reason,
    ))
}

// -- Field helpers ------------------------------------------------------------

/// Labels of missing and malformed fields, in check order.
#[derive(Default)]
struct Problems {
    missing: Vec<&'static str>,
    invalid: Vec<&'static str>,
}

impl Problems {
    fn require(
        &mut self,
        obj: &Map<String, Value>,
        keys: &[&str],
        label: &'static str,
    ) -> Option<String> {
        match text(obj, keys) {
            Text::Present(value) => Some(value),
            Text::Missing => {
                self.missing.push(label);
                None
            }
            Text::Invalid => {
                self.invalid.push(label);
                None
            }
        }
    }

    fn reason(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid {}", self.invalid.join(", ")));
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

enum Text {
    Present(String),
    Missing,
    Invalid,
}

/// First non-null value among `keys`.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Text {
    match lookup(obj, keys) {
        None | Some(Value::Bool(false)) => Text::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => Text::Missing,
        Some(Value::String(s)) => Text::Present(s.trim().to_owned()),
        Some(Value::Number(n)) => Text::Present(n.to_string()),
        Some(_) => Text::Invalid,
    }
}

/// Optional text fields never reject; unusable values fall back to defaults.
fn optional_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match text(obj, keys) {
        Text::Present(s) => Some(s),
        _ => None,
    }
}

fn image_ref(obj: &Map<String, Value>, keys: &[&str]) -> Result<Option<ImageRef>, ()> {
    match lookup(obj, keys) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(ImageRef::parse(s)),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(|bytes| (!bytes.is_empty()).then_some(ImageRef::Bytes(bytes)))
            .ok_or(()),
        Some(_) => Err(()),
    }
}

/// A positive integer that fits in `u32`; anything else means "use default".
fn positive_int(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    lookup(obj, keys)
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}
