//! Traversal of a buffer holding one or more packed event records.
//!
//! A single `read(2)` on a fanotify descriptor returns a batch of records laid
//! end to end. Each record's end is padded up to [`EVENT_ALIGN`]; skipping
//! that rounding misreads every following record.

use crate::error::CodecError;
use crate::event::EventRecord;
use crate::layout::{self, EVENT_ALIGN, HEADER_SIZE};

/// Shortest buffer that can hold a record.
pub const MIN_RECORD_SIZE: usize = HEADER_SIZE;

/// Whether `buf` starts with a complete, addressable record.
///
/// Never fails and never reads past `buf`, so it is safe on short or empty
/// slices from partial reads.
#[must_use]
pub fn has_complete_record(buf: &[u8]) -> bool {
    match layout::peek_event_len(buf) {
        Some(event_len) => event_len > 0 && event_len as usize <= buf.len(),
        None => false,
    }
}

/// Decode the leading record of `buf` and return the bytes after it.
///
/// The remaining slice starts at the record's end rounded up to
/// [`EVENT_ALIGN`], or is empty once the buffer is exhausted.
pub fn next_event(buf: &[u8]) -> Result<(&[u8], EventRecord), CodecError> {
    if !has_complete_record(buf) {
        return Err(CodecError::NoEventAvailable);
    }

    let event = EventRecord::decode(buf)?;
    let next = next_offset(event.event_len() as usize, buf.len());
    Ok((&buf[next..], event))
}

/// Offset of the record following one of `event_len` bytes.
fn next_offset(event_len: usize, available: usize) -> usize {
    layout::align_up(event_len, EVENT_ALIGN).min(available)
}

/// Cursor over a borrowed event buffer.
///
/// Advancing consumes one record at a time. The buffer itself is never
/// modified, so [`EventCursor::rewind`] restarts the traversal from the top.
///
/// As an iterator it yields decoded records until the buffer holds no more
/// complete records. A decoding error is yielded once and ends the iteration;
/// the format has no point to resynchronize from.
#[derive(Debug, Clone)]
pub struct EventCursor<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> EventCursor<'a> {
    /// Create a cursor at the start of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Current read offset into the underlying buffer.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    /// Whether a complete record is available at the current offset.
    #[must_use]
    pub fn has_complete_record(&self) -> bool {
        !self.failed && has_complete_record(self.remaining())
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.buf.len()
    }

    /// Decode the record at the current offset and move past it.
    ///
    /// On error the offset is left unchanged. A malformed record stops the
    /// cursor: later calls report `NoEventAvailable` until [`Self::rewind`].
    pub fn advance(&mut self) -> Result<EventRecord, CodecError> {
        if self.failed {
            return Err(CodecError::NoEventAvailable);
        }

        let remaining = self.remaining();
        match next_event(remaining) {
            Ok((rest, event)) => {
                self.offset += remaining.len() - rest.len();
                Ok(event)
            }
            Err(CodecError::NoEventAvailable) => Err(CodecError::NoEventAvailable),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Restart traversal from the beginning of the buffer.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.failed = false;
    }
}

impl Iterator for EventCursor<'_> {
    type Item = Result<EventRecord, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.advance() {
            Ok(event) => {
                if !event.is_current_version() {
                    tracing::debug!(
                        version = event.version(),
                        offset = self.offset,
                        "Event with unexpected metadata version"
                    );
                }
                Some(Ok(event))
            }
            Err(CodecError::NoEventAvailable) => {
                let trailing = self.remaining().len();
                if trailing > 0 {
                    tracing::trace!(trailing, "Incomplete record at end of buffer");
                }
                None
            }
            Err(e) => {
                tracing::warn!(offset = self.offset, error = %e, "Stopping event traversal");
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for EventCursor<'_> {}
