// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration loading — an optional JSON file, then command-line
// overrides, then validation.

use std::path::Path;

use ticketpress_core::PipelineConfig;
use ticketpress_core::error::{Result, TicketpressError};
use tracing::{debug, info};

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_batch_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub no_deadline: bool,
}

/// Load the file at `path` (defaults when absent), apply `overrides` and
/// validate the result.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            let data = std::fs::read_to_string(path).map_err(|e| {
                TicketpressError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            let config: PipelineConfig = serde_json::from_str(&data).map_err(|e| {
                TicketpressError::Config(format!("cannot parse {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), "Configuration loaded");
            config
        }
        None => {
            debug!("No configuration file, using defaults");
            PipelineConfig::default()
        }
    };

    if let Some(max) = overrides.max_batch_size {
        config.max_batch_size = max;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
    if overrides.no_deadline {
        config.batch_deadline_secs = None;
    } else if let Some(secs) = overrides.deadline_secs {
        config.batch_deadline_secs = Some(secs);
    }

    config.validate()?;
    Ok(config)
}
