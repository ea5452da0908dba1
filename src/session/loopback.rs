//! In-process stand-in for the kernel module, for tests.

use std::future::Future;
use std::io;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use super::channel::Transport;
use super::message::{parse_datagram, NetlinkMessage, NLMSG_DONE};
use crate::codec::FlowRecord;

const LOOPBACK_PORT_ID: u32 = 4242;

pub(crate) struct LoopbackTransport {
    to_kernel: UnboundedSender<Vec<u8>>,
    from_kernel: Mutex<UnboundedReceiver<Vec<u8>>>,
}

/// Kernel side of a loopback pair. Dropping it makes every pending and
/// future receive on the transport fail.
pub(crate) struct KernelPeer {
    inbox: UnboundedReceiver<Vec<u8>>,
    outbox: UnboundedSender<Vec<u8>>,
    seq: u32,
}

pub(crate) fn pair() -> (LoopbackTransport, KernelPeer) {
    let (to_kernel, inbox) = mpsc::unbounded_channel();
    let (outbox, from_kernel) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            to_kernel,
            from_kernel: Mutex::new(from_kernel),
        },
        KernelPeer {
            inbox,
            outbox,
            seq: 0,
        },
    )
}

impl Transport for LoopbackTransport {
    fn port_id(&self) -> u32 {
        LOOPBACK_PORT_ID
    }

    fn send(&self, datagram: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        let sent = self
            .to_kernel
            .send(datagram.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "kernel peer gone"));
        async move { sent }
    }

    fn recv(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        async move {
            self.from_kernel
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "kernel peer gone"))
        }
    }
}

impl KernelPeer {
    /// Next request sent by userspace, or `None` once the transport is gone.
    pub(crate) async fn next_request(&mut self) -> Option<NetlinkMessage> {
        let datagram = self.inbox.recv().await?;
        parse_datagram(&datagram).ok()?.into_iter().next()
    }

    /// Answers `request` the way the module does: same sequence number.
    pub(crate) fn reply(&self, request: &NetlinkMessage, payload: &[u8]) {
        self.send(payload, request.seq);
    }

    /// Unicasts one batch.
    pub(crate) fn push(&mut self, payload: &[u8]) {
        self.seq += 1;
        self.send(payload, self.seq);
    }

    pub(crate) fn push_records(&mut self, records: &[FlowRecord]) {
        let payload: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
        self.push(&payload);
    }

    /// Delivers `datagram` untouched, framing included.
    pub(crate) fn push_raw(&self, datagram: Vec<u8>) {
        let _ = self.outbox.send(datagram);
    }

    fn send(&self, payload: &[u8], seq: u32) {
        let message = NetlinkMessage {
            kind: NLMSG_DONE,
            flags: 0,
            seq,
            port_id: 0,
            payload: payload.to_vec(),
        };
        self.push_raw(message.encode());
    }
}
