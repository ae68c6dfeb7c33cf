// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — rendering one ticket per page and merging pages into the
// final document.

pub mod composer;
pub mod renderer;

pub use composer::DocumentComposer;
pub use renderer::{PageRenderer, PdfTicketRenderer};
