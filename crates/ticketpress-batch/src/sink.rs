// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document sinks — where a composed document goes once the batch is done.
//
// A sink sees a byte stream and a suggested filename, nothing else, so the
// pipeline does not care whether the document ends up on disk, in memory or
// in an HTTP response.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ticketpress_core::ComposedDocument;
use ticketpress_core::error::{Result, TicketpressError};
use tracing::{debug, info, instrument};

/// Accepts the final document.
pub trait DocumentSink: Send + Sync {
    /// Consume `reader` fully and store it under `filename`. Returns a
    /// human-readable location.
    fn accept(&self, filename: &str, reader: &mut dyn Read) -> Result<String>;
}

/// Stream a composed document into `sink`.
pub fn deliver(sink: &dyn DocumentSink, document: &ComposedDocument) -> Result<String> {
    sink.accept(&document.filename, &mut Cursor::new(document.bytes.as_slice()))
}

/// Writes documents into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentSink for FileSink {
    #[instrument(skip(self, reader), fields(dir = %self.dir.display()))]
    fn accept(&self, filename: &str, reader: &mut dyn Read) -> Result<String> {
        // Only the final component is honoured; a filename never escapes `dir`.
        let name = Path::new(filename)
            .file_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                TicketpressError::InvalidRequest(format!("unusable document filename {filename:?}"))
            })?;

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let partial = path.with_extension("pdf.part");

        let written = {
            let mut file = File::create(&partial)?;
            let written = io::copy(reader, &mut file)?;
            file.flush()?;
            file.sync_all()?;
            written
        };
        fs::rename(&partial, &path)?;

        info!(path = %path.display(), bytes = written, "Document written");
        Ok(path.display().to_string())
    }
}

/// Buffers documents in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything received so far.
    pub fn take(&self) -> Vec<(String, Vec<u8>)> {
        self.documents
            .lock()
            .map(|mut docs| std::mem::take(&mut *docs))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentSink for MemorySink {
    fn accept(&self, filename: &str, reader: &mut dyn Read) -> Result<String> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        debug!(filename, bytes_len = bytes.len(), "Document buffered");
        self.documents
            .lock()
            .map_err(|_| TicketpressError::Io(io::Error::other("memory sink lock poisoned")))?
            .push((filename.to_owned(), bytes));
        Ok(format!("memory:{filename}"))
    }
}
