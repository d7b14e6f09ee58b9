use thiserror::Error;

/// Errors that can occur while encoding or decoding wire records
///
/// Inbound payloads come from the network, so every read is bounds-checked
/// and malformed data surfaces as an error instead of a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Reader ran out of bytes mid-field
    #[error("Unexpected end of payload: needed {needed} more bytes, {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    /// Record tag byte does not name a known record type
    #[error("Unknown record tag: {tag}")]
    UnknownRecordTag { tag: u8 },
}
