//! Flow record codec.
//!
//! Turns the fixed-layout binary flow records produced by the kernel module
//! into text lines of the form `"<src> <sport> <dst> <dport> <PROTO>\n"`.
//! Everything in here is pure: no I/O and no retained state between calls.

pub mod batch;
pub mod flow_record;

pub use batch::{decode_batch, DecodedBatch};
pub use flow_record::{decode, FlowRecord, Protocol, RECORD_SIZE};
