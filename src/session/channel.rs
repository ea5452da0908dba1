//! Deadline-aware duplex channel over a datagram [`Transport`].
//!
//! The channel adds what the raw transport lacks: netlink framing, sequence
//! numbers, a read deadline that can be moved while a receive is pending,
//! and mutual exclusion between receivers.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::Instant;

use super::message::{parse_datagram, NetlinkMessage, NLMSG_ERROR, NLMSG_NOOP, NLM_F_REQUEST};
use crate::error_handling::types::ChannelError;

/// Raw datagram endpoint talking to the kernel.
///
/// `recv` must be cancel-safe: dropping the returned future before it
/// completes must not lose a datagram.
pub trait Transport: Send + Sync + 'static {
    /// Port id the endpoint is bound to, stamped on outgoing requests.
    fn port_id(&self) -> u32;

    fn send(&self, datagram: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    fn recv(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// Netlink channel to the kernel module.
///
/// Wraps a [`Transport`] with request framing, a read deadline that other
/// tasks may move at any time, and a receive guard that lets one reader at
/// a time pull messages. Datagrams carrying several messages are split and
/// queued, so each receive yields exactly one message.
///
/// # Examples
///
/// ```ignore
/// let channel = Channel::new(socket);
/// let reply = channel.request(b"rainhurt", Duration::from_secs(10)).await?;
///
/// // From another task: make the pending receive fail now.
/// channel.set_read_deadline(Some(Instant::now()));
/// ```
///
/// # Note
///
/// The deadline is shared by all readers. A receive that starts after the
/// deadline has passed fails with [`ChannelError::DeadlineExceeded`] without
/// touching the transport, even if a datagram is already waiting.
pub struct Channel<T: Transport> {
    transport: T,
    next_seq: AtomicU32,
    deadline: watch::Sender<Option<Instant>>,
    pending: Mutex<VecDeque<NetlinkMessage>>,
    receive_lock: AsyncMutex<()>,
}

/// Exclusive right to read from a [`Channel`].
pub struct Receiver<'a, T: Transport> {
    channel: &'a Channel<T>,
    _guard: AsyncMutexGuard<'a, ()>,
}

impl<T: Transport> Receiver<'_, T> {
    /// Waits for the next message, honouring the channel's read deadline.
    pub async fn receive(&mut self) -> Result<NetlinkMessage, ChannelError> {
        self.channel.next_message().await
    }
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: T) -> Self {
        let (deadline, _) = watch::channel(None);
        Self {
            transport,
            next_seq: AtomicU32::new(1),
            deadline,
            pending: Mutex::new(VecDeque::new()),
            receive_lock: AsyncMutex::new(()),
        }
    }

    /// Sends `payload` as a request and returns its sequence number.
    pub async fn send(&self, payload: &[u8]) -> Result<u32, ChannelError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let message = NetlinkMessage::request(payload, seq, self.transport.port_id());
        trace!("sending request seq={} ({} bytes)", seq, payload.len());
        self.transport
            .send(&message.encode())
            .await
            .map_err(ChannelError::SendError)?;
        Ok(seq)
    }

    /// Sends `payload` and waits at most `timeout` for the reply carrying the
    /// same sequence number.
    pub async fn request(&self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>, ChannelError> {
        let mut receiver = self.lock_receiver().await;
        let seq = self.send(payload).await?;

        self.set_read_deadline(Some(Instant::now() + timeout));
        let reply = receiver.receive().await;
        self.set_read_deadline(None);

        let reply = reply?;
        if reply.seq != seq {
            return Err(ChannelError::Malformed(format!(
                "reply sequence {} does not match request {}",
                reply.seq, seq
            )));
        }
        Ok(reply.payload)
    }

    /// Moves the read deadline. A pending receive wakes up and re-evaluates
    /// it; a deadline at or before now fails it immediately. `None` clears it.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.deadline.send_replace(deadline);
    }

    pub async fn lock_receiver(&self) -> Receiver<'_, T> {
        Receiver {
            channel: self,
            _guard: self.receive_lock.lock().await,
        }
    }

    async fn next_message(&self) -> Result<NetlinkMessage, ChannelError> {
        let mut deadline_rx = self.deadline.subscribe();
        loop {
            let deadline = *deadline_rx.borrow_and_update();
            if matches!(deadline, Some(at) if at <= Instant::now()) {
                return Err(ChannelError::DeadlineExceeded);
            }
            if let Some(message) = self.pop_pending() {
                return Ok(message);
            }

            let expiry = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                datagram = self.transport.recv() => {
                    let datagram = datagram.map_err(ChannelError::ReceiveError)?;
                    self.absorb(&datagram)?;
                }
                _ = expiry => return Err(ChannelError::DeadlineExceeded),
                Ok(()) = deadline_rx.changed() => {
                    debug!("read deadline moved while receiving");
                }
            }
        }
    }

    fn absorb(&self, datagram: &[u8]) -> Result<(), ChannelError> {
        let messages = parse_datagram(datagram)?;
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for message in messages {
            match message.kind {
                NLMSG_NOOP => continue,
                NLMSG_ERROR => match message.error_code() {
                    Some(0) => trace!("ack for seq={}", message.seq),
                    Some(errno) => return Err(ChannelError::Kernel(-errno)),
                    None => {
                        return Err(ChannelError::Malformed(
                            "error message without errno".to_string(),
                        ))
                    }
                },
                _ => {
                    if message.flags & NLM_F_REQUEST != 0 {
                        trace!("unexpected request flag on inbound seq={}", message.seq);
                    }
                    pending.push_back(message);
                }
            }
        }
        Ok(())
    }

    fn pop_pending(&self) -> Option<NetlinkMessage> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}
