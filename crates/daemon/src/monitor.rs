//! fanotify read loop.
//!
//! Owns the fanotify descriptor: reads batches, decodes them, answers
//! permission events and closes every event descriptor it is handed.

use crate::config::Config;
use crate::policy::Policy;
use color_eyre::eyre::{Result, WrapErr, bail};
use fanotify_codec::sys::{self, InitFlags, MarkFlags};
use fanotify_codec::{EventCursor, EventMask, EventRecord, Response, Verdict};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::path::PathBuf;
use tokio::io::unix::AsyncFd;
use tokio::sync::broadcast;

/// What to do with each event.
#[derive(Debug)]
pub enum Mode {
    /// Log accesses.
    Watch,
    /// Answer permission requests according to a policy.
    Guard(Policy),
}

/// Counters for one decoded batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub events: usize,
    pub allowed: usize,
    pub denied: usize,
    pub overflows: usize,
}

pub struct Monitor {
    fan: AsyncFd<OwnedFd>,
    mode: Mode,
    buffer_size: usize,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Monitor {
    /// Create a fanotify group and mark every configured path.
    pub fn open(config: &Config, mode: Mode, shutdown_rx: broadcast::Receiver<()>) -> Result<Self> {
        if config.watch.is_empty() {
            bail!("No paths to mark; pass paths on the command line or add [[watch]] entries");
        }

        let fan = sys::init(
            InitFlags::FAN_CLASS_CONTENT | InitFlags::FAN_CLOEXEC | InitFlags::FAN_NONBLOCK,
            libc::O_RDONLY | libc::O_LARGEFILE,
        )
        .wrap_err("fanotify_init failed (CAP_SYS_ADMIN is required)")?;

        for watch in &config.watch {
            let mask = match mode {
                Mode::Watch => watch.event_mask()?,
                Mode::Guard(_) => EventMask::FAN_OPEN_PERM,
            } | EventMask::FAN_EVENT_ON_CHILD;

            let mut flags = MarkFlags::FAN_MARK_ADD;
            if watch.mount {
                flags |= MarkFlags::FAN_MARK_MOUNT;
            }

            sys::mark(fan.as_fd(), flags, mask, None, Some(&watch.path))?;
            tracing::info!(
                path = %watch.path.display(),
                mount = watch.mount,
                mask = ?mask,
                "Marked path"
            );
        }

        Ok(Self {
            fan: AsyncFd::new(fan)?,
            mode,
            buffer_size: config.daemon.buffer_size.max(fanotify_codec::MIN_RECORD_SIZE),
            shutdown_rx,
        })
    }

    /// Run until shutdown or a fatal error.
    pub async fn run(mut self) -> Result<()> {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            tokio::select! {
                ready = self.fan.readable() => {
                    let mut guard = ready?;
                    let read = guard.try_io(|fan| sys::read_events(fan.get_ref().as_fd(), &mut buf));
                    match read {
                        Ok(Ok(0)) => bail!("fanotify descriptor returned end of file"),
                        Ok(Ok(n)) => {
                            let stats = handle_batch(self.fan.get_ref().as_fd(), &self.mode, &buf[..n])?;
                            tracing::trace!(bytes = n, ?stats, "Handled batch");
                        }
                        Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Ok(Err(e)) => return Err(e).wrap_err("Failed to read events"),
                        Err(_would_block) => continue,
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("Monitor shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Decode and handle every record in `batch`.
///
/// A malformed record aborts the batch; the caller tears the descriptor down.
pub fn handle_batch(fan: BorrowedFd<'_>, mode: &Mode, batch: &[u8]) -> Result<BatchStats> {
    let mut stats = BatchStats::default();
    let mut cursor = EventCursor::new(batch);

    for event in cursor.by_ref() {
        let event = event.wrap_err("Corrupt fanotify event stream")?;
        handle_event(fan, mode, event, &mut stats)?;
    }

    if !cursor.is_exhausted() {
        tracing::debug!(
            trailing = cursor.remaining().len(),
            "Ignoring incomplete record at end of batch"
        );
    }

    Ok(stats)
}

fn handle_event(
    fan: BorrowedFd<'_>,
    mode: &Mode,
    mut event: EventRecord,
    stats: &mut BatchStats,
) -> Result<()> {
    stats.events += 1;
    let mask = event.event_mask();

    if mask.is_overflow() {
        stats.overflows += 1;
        tracing::warn!("Event queue overflow");
        return Ok(());
    }

    // SAFETY: The record was decoded from bytes this process just read from
    // its own fanotify descriptor, so the fd is ours to close.
    let file = unsafe { event.take_fd() };
    let path = file.as_ref().and_then(|fd| fd_path(fd.as_fd()));
    let shown = path
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());

    if !mask.is_permission_request() {
        tracing::info!(pid = event.pid(), mask = ?mask, path = %shown, "File accessed");
        return Ok(());
    }

    let verdict = match mode {
        Mode::Guard(policy) => {
            let decision = policy.decide(event.pid());
            if decision.verdict.contains(Verdict::FAN_ALLOW) {
                tracing::info!(pid = event.pid(), uid = ?decision.uid, path = %shown, "Allowing access");
            } else {
                tracing::warn!(pid = event.pid(), uid = ?decision.uid, path = %shown, "Denying access");
            }
            decision.verdict
        }
        // Never leave a permission request hanging.
        Mode::Watch => Verdict::FAN_ALLOW,
    };

    if verdict.contains(Verdict::FAN_ALLOW) {
        stats.allowed += 1;
    } else {
        stats.denied += 1;
    }

    sys::write_response(fan, &Response::for_event(&event, verdict))
        .wrap_err_with(|| format!("Failed to answer event for pid {}", event.pid()))?;

    // `file` is dropped here, closing the event descriptor after the answer.
    Ok(())
}

/// Resolve the path behind an event descriptor.
fn fd_path(fd: BorrowedFd<'_>) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/self/fd/{}", fd.as_raw_fd())).ok()
}
