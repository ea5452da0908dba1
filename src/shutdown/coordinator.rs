//! Signal-driven shutdown of a capture session.
//!
//! On the first termination signal the coordinator:
//! 1. sets the stopping flag,
//! 2. moves the read deadline into the past to unblock the capture loop,
//! 3. sends the shutdown token,
//! 4. re-arms the deadline to now + grace once it holds the receiver,
//! 5. performs one final receive and hands its outcome to the main path
//!    through a one-shot slot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::codec::{decode_batch, DecodedBatch};
use crate::session::{Received, Session, Transport};

/// Result of the final drain receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The kernel confirmed the end of the session; nothing was pending.
    Marker,
    /// A last batch arrived after shutdown began; it must still be written.
    Trailing(DecodedBatch),
    /// Nothing arrived within the grace period, or the read failed.
    Nothing,
}

/// Consumer end of the coordinator's single-slot handoff.
///
/// The coordinator sends exactly one [`DrainOutcome`], after the stopping
/// flag is set and the drain receive has finished. The main path awaits it
/// only after the capture loop has returned, so the trailing write never
/// overlaps a capture loop write.
pub struct DrainHandoff {
    slot: oneshot::Receiver<DrainOutcome>,
    task: JoinHandle<()>,
}

impl DrainHandoff {
    /// Waits for the coordinator's outcome.
    pub async fn collect(self) -> DrainOutcome {
        self.slot.await.unwrap_or(DrainOutcome::Nothing)
    }

    /// Drops the coordinator when shutdown never started.
    pub fn cancel(self) {
        self.task.abort();
    }
}

pub struct ShutdownCoordinator<T: Transport> {
    session: Arc<Session<T>>,
    grace: Duration,
}

impl<T: Transport> ShutdownCoordinator<T> {
    pub fn new(session: Arc<Session<T>>, grace: Duration) -> Self {
        Self { session, grace }
    }

    /// Spawns the coordinator; it stays idle until `trigger` resolves.
    pub fn spawn<F>(self, trigger: F) -> DrainHandoff
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, slot) = oneshot::channel();
        let task = tokio::spawn(async move {
            trigger.await;
            let outcome = self.shutdown().await;
            let _ = tx.send(outcome);
        });
        DrainHandoff { slot, task }
    }

    /// Runs the shutdown sequence once.
    pub async fn shutdown(&self) -> DrainOutcome {
        let id = self.session.id();
        info!("[{}] termination requested, draining session", id);

        self.session.stopping().trigger();
        self.session.set_read_deadline(Some(Instant::now()));

        if let Err(e) = self.session.request_shutdown().await {
            error!("[{}] {}", id, e);
        }

        match self.session.drain(self.grace).await {
            Received::DrainMarker => {
                debug!("[{}] kernel acknowledged shutdown", id);
                DrainOutcome::Marker
            }
            Received::Batch(bytes) => {
                let batch = decode_batch(&bytes);
                debug!("[{}] drained {} trailing records", id, batch.records);
                DrainOutcome::Trailing(batch)
            }
            Received::Interrupted | Received::Empty => DrainOutcome::Nothing,
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM. Handlers are installed before
/// this returns, so signals arriving before the future is polled are kept.
#[cfg(unix)]
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => debug!("SIGINT received"),
            _ = terminate.recv() => debug!("SIGTERM received"),
        }
    })
}
