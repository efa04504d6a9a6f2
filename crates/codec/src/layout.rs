//! Native byte layout of `struct fanotify_event_metadata`.
//!
//! The kernel writes event headers in the host's in-memory struct layout, so
//! every field is read at a fixed offset with native byte order. The offsets
//! below mirror `linux/fanotify.h`:
//!
//! ```text
//! offset  width  field
//!      0      4  event_len     (u32)
//!      4      1  vers          (u8)
//!      5      1  reserved      (u8)
//!      6      2  metadata_len  (u16)
//!      8      8  mask          (aligned_u64)
//!     16      4  fd            (i32)
//!     20      4  pid           (i32)
//! ```

/// A single field of the fixed header: byte offset and width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// One past the last byte of this field.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }
}

pub const EVENT_LEN: Field = Field::new(0, 4);
pub const VERSION: Field = Field::new(4, 1);
pub const RESERVED: Field = Field::new(5, 1);
pub const METADATA_LEN: Field = Field::new(6, 2);
pub const MASK: Field = Field::new(8, 8);
pub const FD: Field = Field::new(16, 4);
pub const PID: Field = Field::new(20, 4);

/// Size of the fixed event header (`FAN_EVENT_METADATA_LEN`).
pub const HEADER_SIZE: usize = 24;

/// Alignment of the event header. `mask` is declared `aligned_u64`, which
/// forces 8-byte alignment even on 32-bit targets.
pub const EVENT_ALIGN: usize = 8;

/// Round `len` up to the next multiple of `align` (a power of two).
#[must_use]
pub const fn align_up(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

// Buffer readers. Callers check `buf.len() >= HEADER_SIZE` first; every field
// ends at or before HEADER_SIZE so the slices below are always in bounds.

pub(crate) fn read_u8(buf: &[u8], field: Field) -> u8 {
    buf[field.offset]
}

pub(crate) fn read_u16(buf: &[u8], field: Field) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[field.offset..field.end()]);
    u16::from_ne_bytes(raw)
}

pub(crate) fn read_u32(buf: &[u8], field: Field) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[field.offset..field.end()]);
    u32::from_ne_bytes(raw)
}

pub(crate) fn read_i32(buf: &[u8], field: Field) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[field.offset..field.end()]);
    i32::from_ne_bytes(raw)
}

pub(crate) fn read_u64(buf: &[u8], field: Field) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[field.offset..field.end()]);
    u64::from_ne_bytes(raw)
}

/// Read only the `event_len` field, if the buffer holds a full header.
#[must_use]
pub(crate) fn peek_event_len(buf: &[u8]) -> Option<u32> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    Some(read_u32(buf, EVENT_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_match_kernel_struct() {
        assert_eq!(EVENT_LEN.offset, 0);
        assert_eq!(VERSION.offset, 4);
        assert_eq!(RESERVED.offset, 5);
        assert_eq!(METADATA_LEN.offset, 6);
        assert_eq!(MASK.offset, 8);
        assert_eq!(FD.offset, 16);
        assert_eq!(PID.offset, 20);
        assert_eq!(PID.end(), HEADER_SIZE);
    }

    /// Mirror of the kernel struct, used to cross-check the offset table.
    #[repr(C)]
    #[allow(dead_code)]
    struct RawMetadata {
        event_len: u32,
        vers: u8,
        reserved: u8,
        metadata_len: u16,
        mask: u64,
        fd: i32,
        pid: i32,
    }

    #[test]
    fn test_offsets_match_repr_c() {
        use std::mem::{offset_of, size_of};

        assert_eq!(size_of::<RawMetadata>(), HEADER_SIZE);
        assert_eq!(offset_of!(RawMetadata, event_len), EVENT_LEN.offset);
        assert_eq!(offset_of!(RawMetadata, vers), VERSION.offset);
        assert_eq!(offset_of!(RawMetadata, reserved), RESERVED.offset);
        assert_eq!(offset_of!(RawMetadata, metadata_len), METADATA_LEN.offset);
        assert_eq!(offset_of!(RawMetadata, mask), MASK.offset);
        assert_eq!(offset_of!(RawMetadata, fd), FD.offset);
        assert_eq!(offset_of!(RawMetadata, pid), PID.offset);
    }

    #[test]
    fn test_fields_do_not_overlap() {
        let fields = [EVENT_LEN, VERSION, RESERVED, METADATA_LEN, MASK, FD, PID];
        for pair in fields.windows(2) {
            assert_eq!(pair[0].end(), pair[1].offset);
        }
    }

    #[test]
    fn test_mask_is_naturally_aligned() {
        assert_eq!(MASK.offset % EVENT_ALIGN, 0);
        assert_eq!(HEADER_SIZE % EVENT_ALIGN, 0);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(24, 8), 24);
        assert_eq!(align_up(25, 8), 32);
        assert_eq!(align_up(31, 8), 32);
        assert_eq!(align_up(33, 8), 40);
    }

    #[test]
    fn test_peek_event_len_short_buffer() {
        assert_eq!(peek_event_len(&[]), None);
        assert_eq!(peek_event_len(&[0u8; HEADER_SIZE - 1]), None);
    }

    #[test]
    fn test_native_reads() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&48u32.to_ne_bytes());
        buf[4] = 3;
        buf[6..8].copy_from_slice(&24u16.to_ne_bytes());
        buf[8..16].copy_from_slice(&0x1_0000_0001u64.to_ne_bytes());
        buf[16..20].copy_from_slice(&(-1i32).to_ne_bytes());
        buf[20..24].copy_from_slice(&1234i32.to_ne_bytes());

        assert_eq!(peek_event_len(&buf), Some(48));
        assert_eq!(read_u8(&buf, VERSION), 3);
        assert_eq!(read_u8(&buf, RESERVED), 0);
        assert_eq!(read_u16(&buf, METADATA_LEN), 24);
        assert_eq!(read_u64(&buf, MASK), 0x1_0000_0001);
        assert_eq!(read_i32(&buf, FD), -1);
        assert_eq!(read_i32(&buf, PID), 1234);
    }
}
