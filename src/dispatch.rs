use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{AcqRel, Acquire};
use std::sync::Arc;

use concurrent_queue::ConcurrentQueue;

use crate::connection::{Connection, DispatchStatus};
use crate::sys::{self, Waker};

/// Strict-FIFO queue of connections with complete messages waiting to be
/// delivered. Backed by `concurrent_queue::ConcurrentQueue` so a host can
/// call `queue_dispatch` from a signal handler or a worker thread without
/// the loop needing to know about it; a `Waker` keeps the pending count
/// and can break a blocked poll the same way the teacher's own bounded
/// queue toggles its readiness on the 0↔1 pending transition.
pub struct DispatchQueue {
    queue: ConcurrentQueue<Arc<dyn Connection>>,
    pending: AtomicUsize,
    waker: Waker,
}

impl DispatchQueue {
    pub fn new() -> io::Result<DispatchQueue> {
        Ok(DispatchQueue {
            queue: ConcurrentQueue::unbounded(),
            pending: AtomicUsize::new(0),
            waker: Waker::new()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_dispatch(&self, connection: Arc<dyn Connection>) {
        if self.queue.push(connection).is_ok() {
            let prev = self.pending.fetch_add(1, Acquire);
            if prev == 0 {
                let _ = self.waker.wake();
            }
        }
    }

    fn dec(&self) {
        let prev = self.pending.fetch_sub(1, AcqRel);
        if prev == 1 {
            self.waker.drain();
        }
    }

    /// Pops connections one at a time and dispatches each until it
    /// reports `Complete` or `NeedMemory`. A `NeedMemory` connection is
    /// *not* re-pushed — it keeps its place at the front and is retried
    /// after sleeping `oom_wait_ms`. Returns `true` iff at least one
    /// dispatch occurred.
    pub fn dispatch(&self, oom_wait_ms: u64) -> bool {
        let mut any = false;

        while let Ok(connection) = self.queue.pop() {
            self.dec();
            any = true;
            loop {
                match connection.dispatch() {
                    DispatchStatus::Complete => break,
                    DispatchStatus::DataRemains => {}
                    DispatchStatus::NeedMemory => sys::sleep_ms(oom_wait_ms),
                }
            }
        }

        any
    }
}

impl AsRawFd for DispatchQueue {
    fn as_raw_fd(&self) -> RawFd {
        self.waker.as_raw_fd()
    }
}
