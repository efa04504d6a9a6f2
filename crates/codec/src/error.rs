//! Error type for decoding the event stream.

use thiserror::Error;

/// Errors produced while decoding fanotify event records.
///
/// The encode direction has no failure mode and never returns this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than one fixed event header.
    #[error("truncated header: {available} bytes available, {required} required")]
    TruncatedHeader {
        /// Bytes present in the buffer.
        available: usize,
        /// Bytes needed for a complete header.
        required: usize,
    },

    /// The record's length fields contradict each other or the buffer.
    ///
    /// There is no resynchronization point in the stream, so traversal of
    /// the buffer must stop here.
    #[error(
        "malformed record: event_len={event_len} metadata_len={metadata_len} available={available}"
    )]
    MalformedRecord {
        event_len: u32,
        metadata_len: u16,
        available: usize,
    },

    /// The buffer holds no complete record (end of batch or partial read).
    #[error("no event available in buffer")]
    NoEventAvailable,
}

impl CodecError {
    /// Whether the caller can recover by reading more bytes.
    ///
    /// Only `MalformedRecord` is a protocol fault.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MalformedRecord { .. })
    }
}
