//! Netlink message framing.
//!
//! Each datagram exchanged with the kernel holds one or more messages, each a
//! 16-byte `nlmsghdr` followed by its payload and padded to a 4-byte
//! boundary. Header fields use the host's native byte order, as netlink
//! never leaves the machine.

use crate::error_handling::types::ChannelError;

pub const HEADER_LEN: usize = 16;
const ALIGN_TO: usize = 4;

/// Message carries a request.
pub const NLM_F_REQUEST: u16 = 0x01;

pub const NLMSG_NOOP: u16 = 0x1;
pub const NLMSG_ERROR: u16 = 0x2;
pub const NLMSG_DONE: u16 = 0x3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetlinkMessage {
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    pub port_id: u32,
    pub payload: Vec<u8>,
}

impl NetlinkMessage {
    /// A userspace request addressed to the kernel.
    pub fn request(payload: &[u8], seq: u32, port_id: u32) -> Self {
        Self {
            kind: 0,
            flags: NLM_F_REQUEST,
            seq,
            port_id,
            payload: payload.to_vec(),
        }
    }

    /// Encodes the message, header length field included, padded to alignment.
    pub fn encode(&self) -> Vec<u8> {
        let len = HEADER_LEN + self.payload.len();
        let mut out = Vec::with_capacity(align(len));
        out.extend_from_slice(&(len as u32).to_ne_bytes());
        out.extend_from_slice(&self.kind.to_ne_bytes());
        out.extend_from_slice(&self.flags.to_ne_bytes());
        out.extend_from_slice(&self.seq.to_ne_bytes());
        out.extend_from_slice(&self.port_id.to_ne_bytes());
        out.extend_from_slice(&self.payload);
        out.resize(align(len), 0);
        out
    }

    /// Errno carried by an `NLMSG_ERROR` message (0 for an ack).
    pub fn error_code(&self) -> Option<i32> {
        if self.kind != NLMSG_ERROR || self.payload.len() < 4 {
            return None;
        }
        let p = &self.payload;
        Some(i32::from_ne_bytes([p[0], p[1], p[2], p[3]]))
    }
}

pub fn align(len: usize) -> usize {
    (len + ALIGN_TO - 1) & !(ALIGN_TO - 1)
}

/// Splits a datagram into its messages.
pub fn parse_datagram(datagram: &[u8]) -> Result<Vec<NetlinkMessage>, ChannelError> {
    let mut messages = Vec::new();
    let mut offset = 0;

    while datagram.len() - offset >= HEADER_LEN {
        let h = &datagram[offset..offset + HEADER_LEN];
        let len = u32::from_ne_bytes([h[0], h[1], h[2], h[3]]) as usize;
        if len < HEADER_LEN || len > datagram.len() - offset {
            return Err(ChannelError::Malformed(format!(
                "message length {} at offset {} in {}-byte datagram",
                len,
                offset,
                datagram.len()
            )));
        }

        messages.push(NetlinkMessage {
            kind: u16::from_ne_bytes([h[4], h[5]]),
            flags: u16::from_ne_bytes([h[6], h[7]]),
            seq: u32::from_ne_bytes([h[8], h[9], h[10], h[11]]),
            port_id: u32::from_ne_bytes([h[12], h[13], h[14], h[15]]),
            payload: datagram[offset + HEADER_LEN..offset + len].to_vec(),
        });

        offset = (offset + align(len)).min(datagram.len());
    }

    if messages.is_empty() {
        return Err(ChannelError::Malformed(format!(
            "{}-byte datagram holds no message",
            datagram.len()
        )));
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(payload: &[u8], seq: u32) -> NetlinkMessage {
        NetlinkMessage {
            kind: NLMSG_DONE,
            flags: 0,
            seq,
            port_id: 0,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn request_header_layout() {
        let bytes = NetlinkMessage::request(b"rainhurt", 7, 4242).encode();
        assert_eq!(bytes.len(), HEADER_LEN + 8);
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 24);
        assert_eq!(u16::from_ne_bytes(bytes[6..8].try_into().unwrap()), NLM_F_REQUEST);
        assert_eq!(u32::from_ne_bytes(bytes[8..12].try_into().unwrap()), 7);
        assert_eq!(u32::from_ne_bytes(bytes[12..16].try_into().unwrap()), 4242);
        assert_eq!(&bytes[16..], b"rainhurt");
    }

    #[test]
    fn encode_pads_to_alignment() {
        let bytes = done(b"abcde", 1).encode();
        assert_eq!(bytes.len(), 24);
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 21);
        assert_eq!(&bytes[21..], &[0, 0, 0]);
    }

    #[test]
    fn parses_several_messages_in_one_datagram() {
        let mut datagram = done(b"abcde", 1).encode();
        datagram.extend(done(b"seeunext", 2).encode());
        let messages = parse_datagram(&datagram).unwrap();
        assert_eq!(messages, vec![done(b"abcde", 1), done(b"seeunext", 2)]);
    }

    #[test]
    fn rejects_length_past_end() {
        let mut datagram = done(b"seeunext", 1).encode();
        datagram.truncate(20);
        assert!(matches!(
            parse_datagram(&datagram),
            Err(ChannelError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_runt_datagram() {
        assert!(parse_datagram(&[1, 2, 3]).is_err());
        assert!(parse_datagram(&[]).is_err());
    }

    #[test]
    fn error_code_of_ack_and_failure() {
        let mut ack = done(&0i32.to_ne_bytes(), 1);
        ack.kind = NLMSG_ERROR;
        assert_eq!(ack.error_code(), Some(0));

        let mut nack = done(&(-libc::ECONNREFUSED).to_ne_bytes(), 1);
        nack.kind = NLMSG_ERROR;
        assert_eq!(nack.error_code(), Some(-libc::ECONNREFUSED));

        assert_eq!(done(b"data", 1).error_code(), None);
    }
}
