//! Single flow record layout.
//!
//! The kernel module copies `struct ncp_msg` verbatim into each batch. The
//! layout is pinned here explicitly instead of relying on the host's struct
//! layout:
//!
//! ```text
//! offset  size  field
//!      0     4  source address (u32, little endian, host-order value)
//!      4     2  source port    (u16, little endian)
//!      6     2  padding
//!      8     4  dest address   (u32, little endian, host-order value)
//!     12     2  dest port      (u16, little endian)
//!     14     1  protocol number
//!     15     1  padding
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use crate::error_handling::types::CodecError;

/// Size in bytes of one encoded [`FlowRecord`].
pub const RECORD_SIZE: usize = 16;

const SRC_ADDR_OFFSET: usize = 0;
const SRC_PORT_OFFSET: usize = 4;
const DST_ADDR_OFFSET: usize = 8;
const DST_PORT_OFFSET: usize = 12;
const PROTOCOL_OFFSET: usize = 14;

const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Transport protocol of an observed flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Unknown(u8),
}

impl Protocol {
    /// IANA protocol number as carried on the wire.
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Tcp => IPPROTO_TCP,
            Protocol::Udp => IPPROTO_UDP,
            Protocol::Unknown(n) => *n,
        }
    }
}

impl From<u8> for Protocol {
    fn from(value: u8) -> Self {
        match value {
            IPPROTO_TCP => Protocol::Tcp,
            IPPROTO_UDP => Protocol::Udp,
            other => Protocol::Unknown(other),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Unknown(_) => write!(f, "UNKNOWN"),
        }
    }
}

/// One observed packet flow, as reported by the kernel hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub source_address: Ipv4Addr,
    pub source_port: u16,
    pub dest_address: Ipv4Addr,
    pub dest_port: u16,
    pub protocol: Protocol,
}

impl FlowRecord {
    /// Reads the record starting at `offset`.
    ///
    /// Fails with [`CodecError::Truncated`] when fewer than [`RECORD_SIZE`]
    /// bytes remain; the buffer is never read past its end.
    pub fn read(buffer: &[u8], offset: usize) -> Result<Self, CodecError> {
        let available = buffer.len().saturating_sub(offset);
        if available < RECORD_SIZE {
            return Err(CodecError::Truncated {
                offset,
                needed: RECORD_SIZE,
                available,
            });
        }
        let record = &buffer[offset..offset + RECORD_SIZE];

        Ok(Self {
            source_address: Ipv4Addr::from(read_u32(record, SRC_ADDR_OFFSET)),
            source_port: read_u16(record, SRC_PORT_OFFSET),
            dest_address: Ipv4Addr::from(read_u32(record, DST_ADDR_OFFSET)),
            dest_port: read_u16(record, DST_PORT_OFFSET),
            protocol: Protocol::from(record[PROTOCOL_OFFSET]),
        })
    }

    /// Encodes the record in the kernel module's layout, padding zeroed.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[SRC_ADDR_OFFSET..SRC_ADDR_OFFSET + 4]
            .copy_from_slice(&u32::from(self.source_address).to_le_bytes());
        out[SRC_PORT_OFFSET..SRC_PORT_OFFSET + 2].copy_from_slice(&self.source_port.to_le_bytes());
        out[DST_ADDR_OFFSET..DST_ADDR_OFFSET + 4]
            .copy_from_slice(&u32::from(self.dest_address).to_le_bytes());
        out[DST_PORT_OFFSET..DST_PORT_OFFSET + 2].copy_from_slice(&self.dest_port.to_le_bytes());
        out[PROTOCOL_OFFSET] = self.protocol.number();
        out
    }
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.source_address, self.source_port, self.dest_address, self.dest_port, self.protocol
        )
    }
}

/// Decodes the record at `offset` into its text line (newline included) and
/// returns the number of bytes consumed.
pub fn decode(buffer: &[u8], offset: usize) -> Result<(String, usize), CodecError> {
    let record = FlowRecord::read(buffer, offset)?;
    Ok((format!("{}\n", record), RECORD_SIZE))
}

fn read_u32(record: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

fn read_u16(record: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([record[at], record[at + 1]])
}
