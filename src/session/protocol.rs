//! Magic-number session protocol spoken with the kernel module.
//!
//! ```text
//!  userspace                         kernel
//!      │ ── "rainhurt" (request) ──────▶ │   register our port id
//!      │ ◀───────────── "phpisbst" ───── │
//!      │ ◀──────── batch of records ──── │   repeated
//!      │ ── "seeunext" ────────────────▶ │   stop producing
//!      │ ◀─ last batch or "seeunext" ─── │   drain
//! ```

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::Instant;
use uuid::Uuid;

use super::channel::{Channel, Transport};
use crate::error_handling::types::SessionError;
use crate::shutdown::flag::ShutdownFlag;

pub const HANDSHAKE_REQUEST: &[u8; 8] = b"rainhurt";
pub const HANDSHAKE_RESPONSE: &[u8; 8] = b"phpisbst";
/// Sent by us to stop the session, and by the kernel to mark the end of
/// the drain.
pub const SHUTDOWN_TOKEN: &[u8; 8] = b"seeunext";

/// Outcome of one receive on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Raw batch of back-to-back flow records.
    Batch(Vec<u8>),
    /// The kernel's drain-termination marker.
    DrainMarker,
    /// No read happened or the read failed because shutdown is under way.
    Interrupted,
    /// A read failed while running; already reported.
    Empty,
}

pub struct Session<T: Transport> {
    id: Uuid,
    channel: Channel<T>,
    stopping: ShutdownFlag,
}

#[cfg(target_os = "linux")]
impl Session<super::netlink::NetlinkSocket> {
    /// Opens the netlink channel for protocol `family`.
    pub fn connect(family: i32, stopping: ShutdownFlag) -> Result<Self, SessionError> {
        let socket = super::netlink::NetlinkSocket::connect(family).map_err(|e| {
            SessionError::ConnectionFailed(crate::error_handling::types::ChannelError::SocketError(e))
        })?;
        Ok(Self::new(socket, stopping))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, stopping: ShutdownFlag) -> Self {
        let id = Uuid::new_v4();
        debug!("[{}] session created", id);
        Self {
            id,
            channel: Channel::new(transport),
            stopping,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stopping(&self) -> &ShutdownFlag {
        &self.stopping
    }

    /// Exchanges the magic numbers. True only for the exact expected reply;
    /// transport failures and timeouts count as an empty reply.
    pub async fn handshake(&self, timeout: Duration) -> bool {
        let reply = match self.channel.request(HANDSHAKE_REQUEST, timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("[{}] failed to send request: {}", self.id, e);
                Vec::new()
            }
        };

        if reply.as_slice() == HANDSHAKE_RESPONSE {
            info!("[{}] kernel handshake accepted", self.id);
            true
        } else {
            warn!(
                "[{}] unexpected handshake reply {:?}",
                self.id,
                String::from_utf8_lossy(&reply)
            );
            false
        }
    }

    /// Asks the kernel to stop producing and flush; no reply is awaited here.
    pub async fn request_shutdown(&self) -> Result<(), SessionError> {
        self.channel
            .send(SHUTDOWN_TOKEN)
            .await
            .map_err(SessionError::ShutdownRequestFailed)?;
        debug!("[{}] shutdown token sent", self.id);
        Ok(())
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.channel.set_read_deadline(deadline);
    }

    /// Receive path of the capture loop.
    ///
    /// Once stopping is set no read is issued. Failures while stopping are
    /// expected and silent; other failures are reported and yield
    /// [`Received::Empty`].
    pub async fn receive(&self) -> Received {
        let mut receiver = self.channel.lock_receiver().await;
        if self.stopping.is_stopping() {
            return Received::Interrupted;
        }

        match receiver.receive().await {
            Ok(message) => classify(message.payload),
            Err(e) if self.stopping.is_stopping() => {
                debug!("[{}] receive ended by shutdown: {}", self.id, e);
                Received::Interrupted
            }
            Err(e) => {
                error!("[{}] failed to receive request: {}", self.id, e);
                Received::Empty
            }
        }
    }

    /// Final receive of the shutdown sequence, bounded by `grace`.
    ///
    /// The deadline is re-armed only once this call holds the receiver, so a
    /// capture loop read that was forced to fail cannot pick it up.
    pub async fn drain(&self, grace: Duration) -> Received {
        let mut receiver = self.channel.lock_receiver().await;
        self.channel.set_read_deadline(Some(Instant::now() + grace));

        match receiver.receive().await {
            Ok(message) => classify(message.payload),
            Err(e) => {
                warn!("[{}] no drain batch received: {}", self.id, e);
                Received::Interrupted
            }
        }
    }
}

fn classify(payload: Vec<u8>) -> Received {
    if payload.as_slice() == SHUTDOWN_TOKEN {
        Received::DrainMarker
    } else {
        Received::Batch(payload)
    }
}
