use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use crate::connection::Connection;
use crate::dispatch::DispatchQueue;
use crate::pollable::{Event, Pollable};
use crate::ready::Ready;
use crate::registry::WatchRegistry;
use crate::timer::Timer;
use crate::timers::TimerRegistry;
use crate::watch::Watch;

const N_STACK_DESCRIPTORS: usize = 64;
const DEFAULT_OOM_WAIT_MS: u64 = 500;

/// Single-threaded event loop: multiplexes fd-based watches with timers
/// and a deferred-dispatch queue on one thread, the way `DBusLoop` drives
/// `libdbus` connections.
pub struct Loop {
    pollable: Pollable,
    watches: WatchRegistry,
    timers: TimerRegistry,
    dispatch: DispatchQueue,
    oom_wait_ms: u64,
    oom_watch_pending: bool,
    depth: i32,
    pending_quits: Vec<bool>,
}

impl Loop {
    pub fn new() -> io::Result<Loop> {
        Loop::with_capacity(N_STACK_DESCRIPTORS)
    }

    pub fn with_capacity(size_hint: usize) -> io::Result<Loop> {
        Loop::with_oom_wait(size_hint, DEFAULT_OOM_WAIT_MS)
    }

    /// Like `with_capacity`, but lets a host test suite shrink the OOM
    /// backoff sleep to 0 instead of paying 500ms per retried dispatch.
    pub fn with_oom_wait(size_hint: usize, oom_wait_ms: u64) -> io::Result<Loop> {
        Ok(Loop {
            pollable: Pollable::new(size_hint)?,
            watches: WatchRegistry::new(),
            timers: TimerRegistry::new(),
            dispatch: DispatchQueue::new()?,
            oom_wait_ms,
            oom_watch_pending: false,
            depth: 0,
            pending_quits: Vec::new(),
        })
    }

    pub fn add_watch(&mut self, watch: Arc<dyn Watch>) -> bool {
        self.watches.add_watch(&mut self.pollable, watch)
    }

    pub fn toggle_watch(&mut self, watch: &Arc<dyn Watch>) {
        self.watches.toggle_watch(&mut self.pollable, watch)
    }

    pub fn remove_watch(&mut self, watch: &Arc<dyn Watch>) {
        self.watches.remove_watch(&mut self.pollable, watch)
    }

    pub fn add_timer(&mut self, timer: Arc<dyn Timer>) -> usize {
        self.timers.add_timer(timer)
    }

    pub fn remove_timer(&mut self, key: usize) {
        self.timers.remove_timer(key)
    }

    pub fn queue_dispatch(&self, connection: Arc<dyn Connection>) {
        self.dispatch.queue_dispatch(connection)
    }

    /// Runs one iteration. `block` requests the loop wait for readiness
    /// or a timer deadline; it returns early with `timeout = 0` if the
    /// dispatch queue is non-empty. Returns `true` if any progress was
    /// made (a timer fired, a watch fired, or a dispatch happened).
    pub fn iterate(&mut self, block: bool) -> bool {
        let mut retval = false;
        let orig_depth = self.depth;

        if self.watches.watch_count() == 0 && self.timers.count() == 0 {
            return self.drain_dispatch(retval);
        }

        let mut timeout_ms = self.timers.min_remaining_ms().unwrap_or(-1);

        if !block || !self.dispatch.is_empty() {
            timeout_ms = 0;
        }

        if self.oom_watch_pending {
            let oom_wait = self.oom_wait_ms as i32;
            timeout_ms = if timeout_ms < 0 { oom_wait } else { timeout_ms.min(oom_wait) };
        }

        let mut events = [Event { fd: 0, ready: Ready::empty() }; N_STACK_DESCRIPTORS];
        let n_ready = match self.pollable.poll(&mut events, timeout_ms) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
            Err(e) => {
                log::warn!("poll failed: {e}");
                0
            }
        };

        if self.oom_watch_pending {
            self.oom_watch_pending = false;
            for fd in self.watches.fds().collect::<Vec<RawFd>>() {
                let mut changed = false;
                if let Some(bucket) = self.watches.bucket(fd) {
                    for watch in bucket {
                        if watch.oom_last_time() {
                            watch.set_oom_last_time(false);
                            changed = true;
                        }
                    }
                }
                if changed {
                    self.watches.refresh(&mut self.pollable, fd);
                }
            }
            retval = true;
        }

        let initial_serial = (self.watches.serial(), self.timers.serial());

        if self.timers.count() > 0 {
            if self.serial_or_depth_changed(initial_serial, orig_depth) {
                return self.drain_dispatch(retval);
            }
            if self.timers.fire_expired() {
                retval = true;
            }
            if self.serial_or_depth_changed(initial_serial, orig_depth) {
                return self.drain_dispatch(retval);
            }
        }

        for event in events.iter().take(n_ready) {
            if self.serial_or_depth_changed(initial_serial, orig_depth) {
                return self.drain_dispatch(retval);
            }

            if event.ready.is_invalid() {
                self.watches.cull_invalid(&mut self.pollable, event.fd);
                continue;
            }

            if event.ready.is_empty() {
                continue;
            }

            let Some(bucket) = self.watches.bucket(event.fd).map(|b| b.to_vec()) else {
                continue;
            };

            let mut any_oom = false;
            for watch in &bucket {
                if !watch.enabled() {
                    continue;
                }

                let ok = watch.handle(event.ready);
                if !ok {
                    watch.set_oom_last_time(true);
                    self.oom_watch_pending = true;
                    any_oom = true;
                }
                retval = true;

                if self.serial_or_depth_changed(initial_serial, orig_depth) {
                    if any_oom {
                        self.watches.refresh(&mut self.pollable, event.fd);
                    }
                    return self.drain_dispatch(retval);
                }
            }

            if any_oom {
                self.watches.refresh(&mut self.pollable, event.fd);
            }
        }

        self.drain_dispatch(retval)
    }

    fn serial_or_depth_changed(&self, initial_serial: (u64, u64), orig_depth: i32) -> bool {
        (self.watches.serial(), self.timers.serial()) != initial_serial || self.depth != orig_depth
    }

    fn drain_dispatch(&mut self, retval: bool) -> bool {
        self.dispatch.dispatch(self.oom_wait_ms) || retval
    }

    /// Runs iterations, blocking, until a matching `quit()` fires — each
    /// `quit()` ends exactly the innermost active `run()`, even under
    /// recursive `run()` calls from within a watch/timer callback.
    pub fn run(&mut self) {
        let my_depth = self.depth as usize;
        self.depth += 1;
        if self.pending_quits.len() <= my_depth {
            self.pending_quits.resize(my_depth + 1, false);
        }
        self.pending_quits[my_depth] = false;

        while !self.pending_quits[my_depth] {
            self.iterate(true);
        }

        self.pending_quits[my_depth] = false;
        self.depth -= 1;
    }

    /// Requests that the innermost active `run()` return after the
    /// current iteration completes.
    pub fn quit(&mut self) {
        if self.depth == 0 {
            log::warn!("quit() called with no active run()");
            return;
        }
        let innermost = self.depth as usize - 1;
        if self.pending_quits.len() <= innermost {
            self.pending_quits.resize(innermost + 1, false);
        }
        self.pending_quits[innermost] = true;
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }
}
