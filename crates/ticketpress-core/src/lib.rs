// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress — Core types, configuration, record validation and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::PipelineConfig;
pub use error::TicketpressError;
pub use types::*;
pub use validate::{BatchContext, reference_hint, validate};
