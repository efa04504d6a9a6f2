//! fanotify-codec - Encoding and decoding of the Linux fanotify event stream.
//!
//! This crate provides:
//! - [`EventRecord`] decoded from `struct fanotify_event_metadata` plus payload
//! - [`EventCursor`], [`has_complete_record`] and [`next_event`] for walking a
//!   buffer of packed records
//! - [`Response`] and [`encode_response`] for permission decisions
//! - [`EventMask`] and [`Verdict`] bitflags
//! - Thin syscall wrappers in [`sys`] (Linux only)
//!
//! # Wire Format
//!
//! Records use the host's native struct layout and byte order, not a portable
//! encoding. Each record starts with a 24-byte header, is followed by
//! `event_len - metadata_len` payload bytes, and the next record begins at the
//! following 8-byte boundary.
//!
//! The codec does no I/O of its own.
//!
//! # Example
//!
//! ```rust
//! use fanotify_codec::{EventCursor, EventMask, EventRecord, Verdict, encode_response};
//!
//! // Bytes as they would come back from read(2) on a fanotify descriptor.
//! let mut buf = EventRecord::new(EventMask::FAN_OPEN_PERM, 9, 1234).encode();
//! buf.extend(EventRecord::new(EventMask::FAN_OPEN_PERM, 10, 1234).encode());
//!
//! let mut answers = Vec::new();
//! for event in EventCursor::new(&buf) {
//!     let event = event.unwrap();
//!     answers.extend_from_slice(&encode_response(event.fd(), Verdict::FAN_ALLOW));
//! }
//! assert_eq!(answers.len(), 16);
//! ```

mod error;
mod event;
pub mod layout;
mod response;
mod stream;
#[cfg(target_os = "linux")]
pub mod sys;

// Re-export main types at crate root
pub use error::CodecError;
pub use event::{EventMask, EventRecord, FAN_NOFD, FANOTIFY_METADATA_VERSION, max_payload_len};
pub use response::{Response, Verdict, encode_response};
pub use stream::{EventCursor, MIN_RECORD_SIZE, has_complete_record, next_event};

#[cfg(test)]
mod tests {
    use super::*;

    // A read on fd 4 from pid 7345.
    fn sample_event() -> Vec<u8> {
        EventRecord::new(EventMask::FAN_ACCESS, 4, 7345).encode()
    }

    #[test]
    fn test_reexports_accessible() {
        let _ = EventMask::FAN_OPEN;
        let _ = Verdict::FAN_ALLOW;
        let _ = EventRecord::HEADER_SIZE;
        let _ = Response::SIZE;
        let _ = layout::EVENT_ALIGN;
        assert_eq!(FAN_NOFD, -1);
        assert_eq!(FANOTIFY_METADATA_VERSION, 3);
    }

    #[test]
    fn test_empty_buffer_has_no_event() {
        assert!(!has_complete_record(b""));
        assert_eq!(next_event(b"").unwrap_err(), CodecError::NoEventAvailable);
    }

    #[test]
    fn test_read_loop() {
        // 1024 events, consumed in whole multiples of the event size the way a
        // real descriptor hands them out.
        let event = sample_event();
        let stream: Vec<u8> = event.iter().copied().cycle().take(event.len() * 1024).collect();
        let mut written = Vec::new();
        let mut count = 0;

        for chunk in stream.chunks(event.len() * 16) {
            let mut buf = chunk;
            while has_complete_record(buf) {
                let (rest, event) = next_event(buf).unwrap();
                written.extend_from_slice(&encode_response(event.fd(), Verdict::FAN_ALLOW));
                count += 1;
                buf = rest;
            }
            assert!(buf.is_empty());
        }

        assert_eq!(count, 1024);
        let expected: Vec<u8> = encode_response(4, Verdict::FAN_ALLOW)
            .iter()
            .copied()
            .cycle()
            .take(Response::SIZE * 1024)
            .collect();
        assert_eq!(written, expected);
    }

    #[test]
    fn test_records_outlive_buffer() {
        let events: Vec<EventRecord> = {
            let buf = [sample_event(), sample_event()].concat();
            EventCursor::new(&buf).collect::<Result<_, _>>().unwrap()
        };
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.pid() == 7345));
    }
}
