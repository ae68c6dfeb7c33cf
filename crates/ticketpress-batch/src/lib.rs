// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress Batch — bounded-concurrency scheduling of ticket records,
// outcome reporting and document sinks. This crate drives the per-record
// pipeline from `ticketpress-document` over a whole request.

pub mod outcome;
pub mod request;
pub mod scheduler;
pub mod sink;

pub use outcome::OutcomeReporter;
pub use request::{BatchRequest, PageFormat, SingleTicketRequest, TicketRequest};
pub use scheduler::BatchScheduler;
pub use sink::{DocumentSink, FileSink, MemorySink, deliver};
