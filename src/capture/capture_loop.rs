//! Receive, decode and persist batches until the session ends.

use std::io::Write;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::counters::CaptureCounters;
use super::sink::OutputSink;
use crate::codec::decode_batch;
use crate::session::{Received, Session, Transport};

/// Why the capture loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The kernel sent the drain marker on its own (module unloading).
    DrainMarker,
    /// The stopping flag was set; the shutdown coordinator owns the drain.
    Interrupted,
}

pub struct CaptureLoop<T: Transport> {
    session: Arc<Session<T>>,
    counters: Arc<CaptureCounters>,
}

impl<T: Transport> CaptureLoop<T> {
    pub fn new(session: Arc<Session<T>>, counters: Arc<CaptureCounters>) -> Self {
        Self { session, counters }
    }

    /// Runs until the drain marker arrives or stopping is observed. Sink
    /// write failures are reported and skipped.
    pub async fn run<W: Write>(&self, sink: &mut OutputSink<W>) -> StopReason {
        info!("[{}] capture running", self.session.id());
        loop {
            if self.session.stopping().is_stopping() {
                return self.stopped(StopReason::Interrupted);
            }
            match self.session.receive().await {
                Received::Batch(bytes) => {
                    self.consume(&bytes, sink);
                }
                Received::Empty => continue,
                Received::DrainMarker => return self.stopped(StopReason::DrainMarker),
                Received::Interrupted => return self.stopped(StopReason::Interrupted),
            }
        }
    }

    /// Decodes one batch into `sink` and returns the number of records.
    pub fn consume<W: Write>(&self, bytes: &[u8], sink: &mut OutputSink<W>) -> usize {
        let batch = decode_batch(bytes);
        if batch.trailing > 0 {
            warn!(
                "[{}] batch of {} bytes ends with {} stray bytes",
                self.session.id(),
                bytes.len(),
                batch.trailing
            );
        }
        if batch.is_empty() {
            return 0;
        }

        if let Err(e) = sink.write_text(&batch.text) {
            error!("[{}] {}", self.session.id(), e);
        }
        self.counters.record(batch.records as u64);
        batch.records
    }

    fn stopped(&self, reason: StopReason) -> StopReason {
        debug!(
            "[{}] capture stopped: {:?}, {} records so far",
            self.session.id(),
            reason,
            self.counters.total()
        );
        reason
    }
}
