//! Access decisions written back for permission events.

use crate::event::EventRecord;
use bitflags::bitflags;

bitflags! {
    /// Verdict bits for `struct fanotify_response`.
    ///
    /// Kept as an open set: the kernel defines which combinations are legal,
    /// unknown bits pass through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Verdict: u32 {
        /// Let the access proceed.
        const FAN_ALLOW = 0x01;
        /// Fail the access with EPERM.
        const FAN_DENY = 0x02;
        /// Ask the kernel to audit the decision.
        const FAN_AUDIT = 0x10;
    }
}

/// Raw fanotify response structure.
///
/// This is binary-compatible with the kernel's `struct fanotify_response`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Descriptor of the event being answered.
    pub fd: i32,
    /// Verdict bits.
    pub response: u32,
}

impl Response {
    /// Size of the encoded response.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a response for the given descriptor.
    #[must_use]
    pub const fn new(fd: i32, verdict: Verdict) -> Self {
        Self {
            fd,
            response: verdict.bits(),
        }
    }

    /// Create a response answering `event`.
    #[must_use]
    pub const fn for_event(event: &EventRecord, verdict: Verdict) -> Self {
        Self::new(event.fd(), verdict)
    }

    /// Get the verdict as a `Verdict` bitflags value.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        Verdict::from_bits_retain(self.response)
    }

    /// Serialize in the kernel's native layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.fd.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.response.to_ne_bytes());
        buf
    }

    /// Parse a response from bytes.
    ///
    /// Returns `None` if the buffer is too small.
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            fd: i32::from_ne_bytes(buf[0..4].try_into().ok()?),
            response: u32::from_ne_bytes(buf[4..8].try_into().ok()?),
        })
    }
}

/// Encode a decision for `fd` into the bytes to write back.
#[must_use]
pub fn encode_response(fd: i32, verdict: Verdict) -> [u8; Response::SIZE] {
    Response::new(fd, verdict).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMask, FAN_NOFD};

    #[test]
    fn test_response_size() {
        assert_eq!(Response::SIZE, 8);
    }

    #[test]
    fn test_response_roundtrip() {
        let bytes = encode_response(7, Verdict::FAN_ALLOW);
        let parsed = Response::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.fd, 7);
        assert_eq!(parsed.verdict(), Verdict::FAN_ALLOW);

        let fd = i32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        let response = u32::from_ne_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!((fd, response), (7, Verdict::FAN_ALLOW.bits()));
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn test_response_sample_bytes() {
        assert_eq!(
            encode_response(4, Verdict::FAN_ALLOW),
            [0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_response_with_audit_and_nofd() {
        let verdict = Verdict::FAN_DENY | Verdict::FAN_AUDIT;
        let resp = Response::new(FAN_NOFD, verdict);
        let parsed = Response::from_bytes(&resp.to_bytes()).unwrap();
        assert_eq!(parsed.fd, -1);
        assert_eq!(parsed.response, 0x12);
        assert!(parsed.verdict().contains(Verdict::FAN_AUDIT));
    }

    #[test]
    fn test_unknown_verdict_bits_pass_through() {
        let verdict = Verdict::from_bits_retain(0x8000_0001);
        let parsed = Response::from_bytes(&encode_response(3, verdict)).unwrap();
        assert_eq!(parsed.response, 0x8000_0001);
    }

    #[test]
    fn test_response_for_event() {
        let event = EventRecord::new(EventMask::FAN_OPEN_PERM, 11, 500);
        let resp = Response::for_event(&event, Verdict::FAN_DENY);
        assert_eq!(resp, Response::new(11, Verdict::FAN_DENY));
    }

    #[test]
    fn test_from_bytes_short_buffer() {
        assert!(Response::from_bytes(&[0u8; 7]).is_none());
    }
}
