//! Stride decoding of a whole message batch.

use log::trace;

use super::flow_record::{decode, RECORD_SIZE};

/// Text produced from one batch of back-to-back records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    /// Concatenated lines, one per record, each ending in `\n`.
    pub text: String,
    /// Number of records decoded.
    pub records: usize,
    /// Bytes left over after the last whole record (not decoded).
    pub trailing: usize,
}

impl DecodedBatch {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Decodes every whole record in `buffer`, stopping at the last record
/// boundary that fits.
pub fn decode_batch(buffer: &[u8]) -> DecodedBatch {
    let mut text = String::with_capacity(buffer.len() / RECORD_SIZE * 40);
    let mut records = 0;
    let mut offset = 0;

    while buffer.len() - offset >= RECORD_SIZE {
        match decode(buffer, offset) {
            Ok((line, consumed)) => {
                text.push_str(&line);
                offset += consumed;
                records += 1;
            }
            Err(_) => break,
        }
    }

    let trailing = buffer.len() - offset;
    trace!(
        "decoded batch: {} bytes, {} records, {} trailing",
        buffer.len(),
        records,
        trailing
    );

    DecodedBatch {
        text,
        records,
        trailing,
    }
}
