//! fanotify event records and mask constants.
//!
//! This module decodes `struct fanotify_event_metadata` plus any trailing
//! payload out of a byte buffer, using the host's native layout.

use crate::error::CodecError;
use crate::layout::{self, HEADER_SIZE};
use bitflags::bitflags;
use std::os::fd::{FromRawFd, OwnedFd};

/// Metadata version written by current kernels.
pub const FANOTIFY_METADATA_VERSION: u8 = 3;

/// `fd` value carried by events that have no file descriptor attached.
pub const FAN_NOFD: i32 = -1;

bitflags! {
    /// fanotify event mask flags.
    ///
    /// These match the kernel's fanotify mask values exactly. Unknown bits
    /// reported by newer kernels are retained, not truncated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u64 {
        /// File was accessed (e.g., read).
        const FAN_ACCESS = 0x0000_0001;
        /// File was modified.
        const FAN_MODIFY = 0x0000_0002;
        /// Metadata changed.
        const FAN_ATTRIB = 0x0000_0004;
        /// Writable file was closed.
        const FAN_CLOSE_WRITE = 0x0000_0008;
        /// Unwritable file was closed.
        const FAN_CLOSE_NOWRITE = 0x0000_0010;
        /// File was opened.
        const FAN_OPEN = 0x0000_0020;
        /// File moved out of a watched directory.
        const FAN_MOVED_FROM = 0x0000_0040;
        /// File moved into a watched directory.
        const FAN_MOVED_TO = 0x0000_0080;
        /// File created in a watched directory.
        const FAN_CREATE = 0x0000_0100;
        /// File deleted from a watched directory.
        const FAN_DELETE = 0x0000_0200;
        /// Watched object was deleted.
        const FAN_DELETE_SELF = 0x0000_0400;
        /// Watched object was moved.
        const FAN_MOVE_SELF = 0x0000_0800;
        /// File was opened for execution.
        const FAN_OPEN_EXEC = 0x0000_1000;
        /// Event queue overflowed.
        const FAN_Q_OVERFLOW = 0x0000_4000;
        /// Permission to open requested.
        const FAN_OPEN_PERM = 0x0001_0000;
        /// Permission to read requested.
        const FAN_ACCESS_PERM = 0x0002_0000;
        /// Permission to open for execution requested.
        const FAN_OPEN_EXEC_PERM = 0x0004_0000;
        /// Report events on children of a marked directory.
        const FAN_EVENT_ON_CHILD = 0x0800_0000;
        /// Event occurred against a directory.
        const FAN_ONDIR = 0x4000_0000;

        // Convenience combinations
        /// Close event (write or no-write).
        const FAN_CLOSE = Self::FAN_CLOSE_WRITE.bits() | Self::FAN_CLOSE_NOWRITE.bits();
        /// Move event (from or to).
        const FAN_MOVE = Self::FAN_MOVED_FROM.bits() | Self::FAN_MOVED_TO.bits();

        /// Events a mark can listen for without a permission class.
        const FAN_ALL_EVENTS = Self::FAN_ACCESS.bits()
            | Self::FAN_MODIFY.bits()
            | Self::FAN_CLOSE.bits()
            | Self::FAN_OPEN.bits();

        /// Events that require a response.
        const FAN_ALL_PERM_EVENTS = Self::FAN_OPEN_PERM.bits()
            | Self::FAN_ACCESS_PERM.bits();

        /// Everything the kernel may report to a listener.
        const FAN_ALL_OUTGOING_EVENTS = Self::FAN_ALL_EVENTS.bits()
            | Self::FAN_ALL_PERM_EVENTS.bits()
            | Self::FAN_Q_OVERFLOW.bits();
    }
}

impl EventMask {
    /// Whether the kernel is waiting for a response to this event.
    #[must_use]
    pub fn is_permission_request(&self) -> bool {
        self.intersects(
            Self::FAN_OPEN_PERM | Self::FAN_ACCESS_PERM | Self::FAN_OPEN_EXEC_PERM,
        )
    }

    /// Whether this event reports a queue overflow.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        self.contains(Self::FAN_Q_OVERFLOW)
    }

    /// Look up a single event type by its short lowercase name.
    ///
    /// Accepts names like `open`, `close_write`, `open_perm`, and the
    /// combinations `close`, `move`, `all`.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        let mask = match name.trim().to_ascii_lowercase().as_str() {
            "access" => Self::FAN_ACCESS,
            "modify" => Self::FAN_MODIFY,
            "attrib" => Self::FAN_ATTRIB,
            "close_write" => Self::FAN_CLOSE_WRITE,
            "close_nowrite" => Self::FAN_CLOSE_NOWRITE,
            "close" => Self::FAN_CLOSE,
            "open" => Self::FAN_OPEN,
            "open_exec" => Self::FAN_OPEN_EXEC,
            "moved_from" => Self::FAN_MOVED_FROM,
            "moved_to" => Self::FAN_MOVED_TO,
            "move" => Self::FAN_MOVE,
            "create" => Self::FAN_CREATE,
            "delete" => Self::FAN_DELETE,
            "delete_self" => Self::FAN_DELETE_SELF,
            "move_self" => Self::FAN_MOVE_SELF,
            "open_perm" => Self::FAN_OPEN_PERM,
            "access_perm" => Self::FAN_ACCESS_PERM,
            "open_exec_perm" => Self::FAN_OPEN_EXEC_PERM,
            "ondir" => Self::FAN_ONDIR,
            "on_child" => Self::FAN_EVENT_ON_CHILD,
            "all" => Self::FAN_ALL_EVENTS,
            _ => return None,
        };
        Some(mask)
    }
}

/// Largest payload a record with a `metadata_len`-byte header can describe.
#[must_use]
pub const fn max_payload_len(metadata_len: u16) -> usize {
    u32::MAX as usize - metadata_len as usize
}

/// One decoded fanotify event.
///
/// The header fields mirror `struct fanotify_event_metadata`. The `fd` is an
/// open descriptor owned by whoever holds the record; the codec never closes
/// it. Records are deliberately not `Clone` so that ownership of the
/// descriptor cannot be duplicated.
#[derive(Debug, PartialEq, Eq)]
pub struct EventRecord {
    event_len: u32,
    version: u8,
    reserved: u8,
    metadata_len: u16,
    mask: u64,
    fd: i32,
    pid: i32,
    payload: Vec<u8>,
    fd_taken: bool,
}

impl EventRecord {
    /// Size of the fixed portion of the event structure.
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Create a record with no payload.
    #[must_use]
    pub const fn new(mask: EventMask, fd: i32, pid: i32) -> Self {
        Self {
            event_len: HEADER_SIZE as u32,
            version: FANOTIFY_METADATA_VERSION,
            reserved: 0,
            metadata_len: HEADER_SIZE as u16,
            mask: mask.bits(),
            fd,
            pid,
            payload: Vec::new(),
            fd_taken: false,
        }
    }

    /// Attach a trailing payload, updating `event_len` to match.
    ///
    /// The payload is truncated to [`max_payload_len`] so that `event_len`
    /// always equals `metadata_len` plus the payload length.
    #[must_use]
    pub fn with_payload(mut self, mut payload: Vec<u8>) -> Self {
        payload.truncate(max_payload_len(self.metadata_len));
        // Fits in u32 after the truncation above.
        self.event_len = (usize::from(self.metadata_len) + payload.len()) as u32;
        self.payload = payload;
        self
    }

    /// Decode the record at the start of `buf`.
    ///
    /// `buf` may extend past the record; only `event_len` bytes are used.
    /// The payload is copied, so the record outlives `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::TruncatedHeader {
                available: buf.len(),
                required: HEADER_SIZE,
            });
        }

        let event_len = layout::read_u32(buf, layout::EVENT_LEN);
        let metadata_len = layout::read_u16(buf, layout::METADATA_LEN);
        let malformed = CodecError::MalformedRecord {
            event_len,
            metadata_len,
            available: buf.len(),
        };

        let end = usize::try_from(event_len).map_err(|_| malformed.clone())?;
        let header_len = usize::from(metadata_len);
        if header_len > end || end > buf.len() || header_len < HEADER_SIZE {
            return Err(malformed);
        }

        // The payload follows the fixed fields, whatever metadata_len claims.
        let payload_end = HEADER_SIZE + (end - header_len);
        if payload_end > end {
            return Err(malformed);
        }

        Ok(Self {
            event_len,
            version: layout::read_u8(buf, layout::VERSION),
            reserved: layout::read_u8(buf, layout::RESERVED),
            metadata_len,
            mask: layout::read_u64(buf, layout::MASK),
            fd: layout::read_i32(buf, layout::FD),
            pid: layout::read_i32(buf, layout::PID),
            payload: buf[HEADER_SIZE..payload_end].to_vec(),
            fd_taken: false,
        })
    }

    /// Serialize this record in the kernel's native layout.
    ///
    /// The payload follows the fixed header. The record is zero-filled up to
    /// `event_len`, which exceeds header plus payload when `metadata_len` is
    /// larger than the fixed header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[layout::EVENT_LEN.offset..layout::EVENT_LEN.end()]
            .copy_from_slice(&self.event_len.to_ne_bytes());
        buf[layout::VERSION.offset] = self.version;
        buf[layout::RESERVED.offset] = self.reserved;
        buf[layout::METADATA_LEN.offset..layout::METADATA_LEN.end()]
            .copy_from_slice(&self.metadata_len.to_ne_bytes());
        buf[layout::MASK.offset..layout::MASK.end()].copy_from_slice(&self.mask.to_ne_bytes());
        buf[layout::FD.offset..layout::FD.end()].copy_from_slice(&self.fd.to_ne_bytes());
        buf[layout::PID.offset..layout::PID.end()].copy_from_slice(&self.pid.to_ne_bytes());
        buf.extend_from_slice(&self.payload);
        let total = (self.event_len as usize).max(buf.len());
        buf.resize(total, 0);
        buf
    }

    /// Total byte length of the record, header and payload.
    #[must_use]
    pub const fn event_len(&self) -> u32 {
        self.event_len
    }

    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    #[must_use]
    pub const fn reserved(&self) -> u8 {
        self.reserved
    }

    /// Byte length of the header portion.
    #[must_use]
    pub const fn metadata_len(&self) -> u16 {
        self.metadata_len
    }

    /// Raw mask bits as reported by the kernel.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        self.mask
    }

    /// Get the event mask as an `EventMask` bitflags value.
    #[must_use]
    pub const fn event_mask(&self) -> EventMask {
        EventMask::from_bits_retain(self.mask)
    }

    /// The raw descriptor value, `FAN_NOFD` when none is attached.
    ///
    /// This is the value to answer a permission event with.
    #[must_use]
    pub const fn fd(&self) -> i32 {
        self.fd
    }

    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }

    /// Trailing bytes after the header. Opaque; usually empty.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the record was written by a kernel speaking the version this
    /// crate was built against.
    #[must_use]
    pub const fn is_current_version(&self) -> bool {
        self.version == FANOTIFY_METADATA_VERSION
    }

    /// Whether the record carries a descriptor at all.
    #[must_use]
    pub const fn has_fd(&self) -> bool {
        self.fd >= 0
    }

    /// Take ownership of the event's file descriptor.
    ///
    /// Returns `None` if the event has no descriptor or it was already taken.
    /// Dropping the returned `OwnedFd` closes it.
    ///
    /// # Safety
    ///
    /// The record must have been decoded from bytes read off a fanotify
    /// descriptor by this process, so that `fd` refers to an open descriptor
    /// nobody else owns.
    pub unsafe fn take_fd(&mut self) -> Option<OwnedFd> {
        if self.fd_taken || !self.has_fd() {
            return None;
        }
        self.fd_taken = true;
        // SAFETY: Caller guarantees the kernel handed us this descriptor and
        // the flag above ensures we give it out at most once.
        Some(unsafe { OwnedFd::from_raw_fd(self.fd) })
    }
}
