//! Thin wrappers over the fanotify syscalls.
//!
//! These carry no policy: they forward flags as given and convert the C error
//! convention into `io::Result`. See fanotify_init(2) and fanotify_mark(2).

use crate::event::EventMask;
use crate::response::Response;
use bitflags::bitflags;
use std::ffi::{CString, c_uint, c_void};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

bitflags! {
    /// Flags for `fanotify_init`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InitFlags: u32 {
        /// Set close-on-exec on the new descriptor.
        const FAN_CLOEXEC = 0x0000_0001;
        /// Open the descriptor non-blocking.
        const FAN_NONBLOCK = 0x0000_0002;
        /// Notification only, no permission events.
        const FAN_CLASS_NOTIF = 0x0000_0000;
        /// Permission decisions after content is final.
        const FAN_CLASS_CONTENT = 0x0000_0004;
        /// Permission decisions before content is final.
        const FAN_CLASS_PRE_CONTENT = 0x0000_0008;
        /// Remove the event queue limit.
        const FAN_UNLIMITED_QUEUE = 0x0000_0010;
        /// Remove the mark count limit.
        const FAN_UNLIMITED_MARKS = 0x0000_0020;
    }
}

bitflags! {
    /// Flags for `fanotify_mark`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MarkFlags: u32 {
        const FAN_MARK_ADD = 0x0000_0001;
        const FAN_MARK_REMOVE = 0x0000_0002;
        /// Don't follow a trailing symlink.
        const FAN_MARK_DONT_FOLLOW = 0x0000_0004;
        /// Fail unless the path is a directory.
        const FAN_MARK_ONLYDIR = 0x0000_0008;
        /// Mark the whole mount containing the path.
        const FAN_MARK_MOUNT = 0x0000_0010;
        const FAN_MARK_IGNORED_MASK = 0x0000_0020;
        const FAN_MARK_IGNORED_SURV_MODIFY = 0x0000_0040;
        /// Remove all marks of the given kind.
        const FAN_MARK_FLUSH = 0x0000_0080;
        /// Mark the whole filesystem containing the path.
        const FAN_MARK_FILESYSTEM = 0x0000_0100;
    }
}

/// Create a fanotify group and return its descriptor.
///
/// `event_f_flags` are the `open(2)` status flags applied to the descriptors
/// delivered with each event, e.g. `libc::O_RDONLY`.
pub fn init(flags: InitFlags, event_f_flags: i32) -> io::Result<OwnedFd> {
    // SAFETY: fanotify_init takes plain integers and returns a new fd or -1.
    let fd = unsafe { libc::fanotify_init(flags.bits() as c_uint, event_f_flags as c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: The kernel just created this descriptor and nobody else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Add, remove or flush a mark on a filesystem object.
///
/// `dirfd` defaults to `AT_FDCWD`; a `None` path passes NULL, as some mark
/// flags require. On failure the error mentions the path when one was given.
pub fn mark(
    fan: BorrowedFd<'_>,
    flags: MarkFlags,
    mask: EventMask,
    dirfd: Option<BorrowedFd<'_>>,
    path: Option<&Path>,
) -> io::Result<()> {
    let dirfd = dirfd.map_or(libc::AT_FDCWD, |fd| fd.as_raw_fd());
    let c_path = path
        .map(|p| CString::new(p.as_os_str().as_bytes()))
        .transpose()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let path_ptr = c_path.as_ref().map_or(std::ptr::null(), |p| p.as_ptr());

    // SAFETY: `path_ptr` is either NULL or a NUL-terminated string that
    // outlives the call.
    let rv = unsafe {
        libc::fanotify_mark(
            fan.as_raw_fd(),
            flags.bits() as c_uint,
            mask.bits(),
            dirfd,
            path_ptr,
        )
    };
    if rv < 0 {
        let err = io::Error::last_os_error();
        return Err(match path {
            Some(p) => io::Error::new(err.kind(), format!("{}: {err}", p.display())),
            None => err,
        });
    }
    Ok(())
}

/// Read a batch of events into `buf`, returning the number of bytes read.
pub fn read_events(fan: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
    let n = unsafe { libc::read(fan.as_raw_fd(), buf.as_mut_ptr().cast::<c_void>(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Write a response back to the fanotify descriptor.
///
/// The kernel consumes whole responses; a short write is reported as an
/// error.
pub fn write_response(fan: BorrowedFd<'_>, response: &Response) -> io::Result<()> {
    let bytes = response.to_bytes();
    // SAFETY: `bytes` is valid for reads of its full length.
    let n = unsafe { libc::write(fan.as_raw_fd(), bytes.as_ptr().cast::<c_void>(), bytes.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    if n as usize != bytes.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short response write: {n} of {} bytes", bytes.len()),
        ));
    }
    Ok(())
}
