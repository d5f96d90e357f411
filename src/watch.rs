use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ready::Ready;

/// Host-owned interest in readability/writability of one pollable fd.
///
/// A `Watch` is shared with the loop via `Arc<dyn Watch>`. Every method
/// except `oom_last_time`/`set_oom_last_time` is implemented by the host;
/// those two back a flag the loop alone mutates (see the OOM protocol in
/// the crate docs), which is why they're provided by [`WatchFlags`] rather
/// than left to each implementation to get right.
pub trait Watch: Send + Sync {
    /// The fd this watch is interested in.
    fn fd(&self) -> RawFd;

    /// Readable/writable interest, ignoring `enabled()`.
    fn interest(&self) -> Ready;

    /// Whether the loop should currently deliver events for this watch.
    fn enabled(&self) -> bool;

    /// Invoked with the fd's event mask. Returns `false` on transient
    /// out-of-memory failure (the loop will withdraw and retry later),
    /// `true` otherwise.
    fn handle(&self, events: Ready) -> bool;

    /// Called once if the kernel reports this fd as invalid; the watch
    /// must not be used again afterwards.
    fn invalidate(&self);

    /// Loop-owned: true if this watch was skipped last time due to OOM.
    fn oom_last_time(&self) -> bool;

    /// Loop-owned setter for `oom_last_time`.
    fn set_oom_last_time(&self, value: bool);
}

/// A ready-made `AtomicBool`-backed `oom_last_time` flag for `Watch`
/// implementors that don't want to track it themselves.
#[derive(Debug, Default)]
pub struct WatchFlags {
    oom_last_time: AtomicBool,
}

impl WatchFlags {
    pub fn new() -> WatchFlags {
        WatchFlags {
            oom_last_time: AtomicBool::new(false),
        }
    }

    pub fn oom_last_time(&self) -> bool {
        self.oom_last_time.load(Ordering::Acquire)
    }

    pub fn set_oom_last_time(&self, value: bool) {
        self.oom_last_time.store(value, Ordering::Release);
    }
}
