use std::os::unix::io::RawFd;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::pollable::Pollable;
use crate::ready::Ready;
use crate::watch::Watch;

/// Watches grouped by fd, the way the fd's aggregated interest is computed
/// and pushed to the pollable set as one unit. Bucket order is insertion
/// order; within a bucket, watches fire in insertion order too.
#[derive(Default)]
pub struct WatchRegistry {
    buckets: IndexMap<RawFd, Vec<Arc<dyn Watch>>>,
    serial: u64,
    watch_count: usize,
}

impl WatchRegistry {
    pub fn new() -> WatchRegistry {
        WatchRegistry::default()
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn watch_count(&self) -> usize {
        self.watch_count
    }

    pub fn bucket(&self, fd: RawFd) -> Option<&[Arc<dyn Watch>]> {
        self.buckets.get(&fd).map(|v| v.as_slice())
    }

    pub fn fds(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.buckets.keys().copied()
    }

    /// Adds `watch` to its fd's bucket, creating the bucket if needed.
    /// Registers the fd with the pollable set on first use, otherwise
    /// just refreshes the aggregated interest.
    pub fn add_watch(&mut self, pollable: &mut Pollable, watch: Arc<dyn Watch>) -> bool {
        let fd = watch.fd();
        let first = !self.buckets.contains_key(&fd);
        let bucket = self.buckets.entry(fd).or_default();
        bucket.push(watch.clone());

        if first {
            if !pollable.add(fd, watch.interest(), watch.enabled()) {
                self.buckets.shift_remove(&fd);
                return false;
            }
        } else {
            self.refresh(pollable, fd);
        }

        self.serial += 1;
        self.watch_count += 1;
        true
    }

    pub fn toggle_watch(&mut self, pollable: &mut Pollable, watch: &Arc<dyn Watch>) {
        self.refresh(pollable, watch.fd());
    }

    /// Removes `watch` from its bucket by pointer identity. If the
    /// bucket becomes empty, drops it and releases the fd from the
    /// pollable set.
    pub fn remove_watch(&mut self, pollable: &mut Pollable, watch: &Arc<dyn Watch>) {
        let fd = watch.fd();
        let Some(bucket) = self.buckets.get_mut(&fd) else {
            log::warn!("removing unknown watch for fd {fd}");
            return;
        };

        let before = bucket.len();
        bucket.retain(|w| !Arc::ptr_eq(w, watch));
        if bucket.len() == before {
            log::warn!("removing unknown watch for fd {fd}");
            return;
        }

        self.serial += 1;
        self.watch_count -= 1;

        if bucket.is_empty() {
            self.buckets.shift_remove(&fd);
            pollable.remove(fd);
        }
    }

    /// Aggregates `interest()` across enabled, non-OOM watches on `fd`
    /// and pushes the result to the pollable set.
    pub fn refresh(&self, pollable: &mut Pollable, fd: RawFd) {
        let Some(bucket) = self.buckets.get(&fd) else {
            return;
        };

        let mut flags = Ready::empty();
        let mut interested = false;
        for watch in bucket {
            if watch.enabled() && !watch.oom_last_time() {
                flags.insert(watch.interest());
                interested = true;
            }
        }

        if interested {
            pollable.enable(fd, flags);
        } else {
            pollable.disable(fd);
        }
    }

    /// The kernel reported `fd` as invalid: invalidate every watch in its
    /// bucket, drop the bucket, and release the fd from the pollable set.
    pub fn cull_invalid(&mut self, pollable: &mut Pollable, fd: RawFd) {
        log::warn!("invalid request, fd {fd} not open");
        if let Some(bucket) = self.buckets.shift_remove(&fd) {
            self.watch_count -= bucket.len();
            self.serial += 1;
            for watch in &bucket {
                watch.invalidate();
            }
        }
        pollable.remove(fd);
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::io::RawFd;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct NoopWatch {
        fd: RawFd,
        invalidated: AtomicBool,
    }

    impl Watch for NoopWatch {
        fn fd(&self) -> RawFd {
            self.fd
        }
        fn interest(&self) -> Ready {
            Ready::readable()
        }
        fn enabled(&self) -> bool {
            true
        }
        fn handle(&self, _events: Ready) -> bool {
            true
        }
        fn invalidate(&self) {
            self.invalidated.store(true, Ordering::Release);
        }
        fn oom_last_time(&self) -> bool {
            false
        }
        fn set_oom_last_time(&self, _v: bool) {}
    }

    /// Mirrors `cull_watches_for_invalid_fd`: an invalid-fd report must
    /// invalidate every watch on that fd and drop it from both the
    /// registry and the pollable set, so it is never looked at again.
    #[test]
    fn cull_invalid_invalidates_and_drops_bucket() {
        let mut pollable = Pollable::new(8).unwrap();
        let mut registry = WatchRegistry::new();

        let mut fds = [0; 2];
        unsafe { libc::pipe(fds.as_mut_ptr()) };
        let (r, w) = (fds[0], fds[1]);

        let watch: Arc<NoopWatch> = Arc::new(NoopWatch { fd: r, invalidated: AtomicBool::new(false) });
        let watch_dyn: Arc<dyn Watch> = watch.clone();
        assert!(registry.add_watch(&mut pollable, watch_dyn));
        assert_eq!(registry.watch_count(), 1);

        registry.cull_invalid(&mut pollable, r);

        assert!(watch.invalidated.load(Ordering::Acquire));
        assert!(registry.bucket(r).is_none());
        assert_eq!(registry.fds().count(), 0);
        assert_eq!(registry.watch_count(), 0);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }
}
