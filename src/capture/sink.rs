//! Buffered, append-only output for decoded lines.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use log::info;

use crate::error_handling::types::SinkError;

/// Default write buffer, large enough for a few thousand lines.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

pub struct OutputSink<W: Write> {
    writer: BufWriter<W>,
    echo: bool,
}

impl OutputSink<File> {
    /// Opens `path` for appending, creating it with mode 0644 if needed.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize, echo: bool) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o644)
            .open(path)
            .map_err(SinkError::OpenFailed)?;
        info!(
            "Writing capture to {} ({} byte buffer)",
            path.display(),
            capacity
        );
        Ok(Self::new(file, capacity, echo))
    }
}

impl<W: Write> OutputSink<W> {
    /// Wraps `writer`. With `echo` set every write is also printed to stdout.
    pub fn new(writer: W, capacity: usize, echo: bool) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, writer),
            echo,
        }
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), SinkError> {
        if self.echo {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
        }
        self.writer
            .write_all(text.as_bytes())
            .map_err(SinkError::WriteFailed)
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(SinkError::FlushFailed)
    }

    /// The underlying writer; buffered bytes not yet flushed are not in it.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}
