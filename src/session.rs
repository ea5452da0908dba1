//! Session with the in-kernel flow observer.
//!
//! The kernel module registers a custom netlink protocol family. This module
//! owns that channel: framing ([`message`]), a deadline-aware wrapper with
//! receive exclusion ([`channel`]), the raw socket ([`netlink`], Linux only)
//! and the magic-number protocol on top ([`protocol`]).

pub mod channel;
pub mod message;
#[cfg(target_os = "linux")]
pub mod netlink;
pub mod protocol;

#[cfg(test)]
pub(crate) mod loopback;

pub use channel::{Channel, Transport};
#[cfg(target_os = "linux")]
pub use netlink::NetlinkSocket;
pub use protocol::{Received, Session, HANDSHAKE_REQUEST, HANDSHAKE_RESPONSE, SHUTDOWN_TOKEN};
