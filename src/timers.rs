use std::sync::Arc;

use slab::Slab;

use crate::sys;
use crate::timer::Timer;

/// A monotonic instant split the way the rest of the crate does its
/// arithmetic: whole seconds plus a microsecond remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Instant {
    sec: u64,
    usec: u32,
}

impl Instant {
    fn now() -> Instant {
        let (sec, usec) = sys::monotonic_time();
        Instant { sec, usec }
    }

    /// Microseconds until this instant, as seen from `self`. Widened to
    /// `i64` so a clock regression or a large interval can't overflow
    /// before the final `i32::MAX` saturation at the poll boundary.
    fn micros_until(&self, other: Instant) -> i64 {
        let self_us = self.sec as i64 * 1_000_000 + self.usec as i64;
        let other_us = other.sec as i64 * 1_000_000 + other.usec as i64;
        other_us - self_us
    }
}

pub struct TimerRecord {
    timer: Arc<dyn Timer>,
    last: Instant,
}

/// Timer bookkeeping, backed by a `slab::Slab` so handles stay stable
/// across insert/remove without renumbering every other timer.
#[derive(Default)]
pub struct TimerRegistry {
    timers: Slab<TimerRecord>,
    serial: u64,
}

impl TimerRegistry {
    pub fn new() -> TimerRegistry {
        TimerRegistry::default()
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn count(&self) -> usize {
        self.timers.len()
    }

    pub fn add_timer(&mut self, timer: Arc<dyn Timer>) -> usize {
        let key = self.timers.insert(TimerRecord { timer, last: Instant::now() });
        self.serial += 1;
        key
    }

    pub fn remove_timer(&mut self, key: usize) {
        if self.timers.try_remove(key).is_none() {
            log::warn!("could not find timer {key} to remove");
            return;
        }
        self.serial += 1;
    }

    /// Minimum remaining-ms across enabled timers, or `None` if there are
    /// none. Also restarts any timer whose host requested it.
    pub fn min_remaining_ms(&mut self) -> Option<i32> {
        let now = Instant::now();
        let mut min: Option<i32> = None;

        for (_, record) in self.timers.iter_mut() {
            if !record.timer.enabled() {
                continue;
            }
            if record.timer.needs_restart() {
                record.last = now;
                record.timer.mark_restarted();
            }
            // Clamped to 0 for the poll timeout: a negative remaining means
            // the timer is already overdue and must be treated as "ready
            // now", not folded into a negative timeout (which `Pollable::poll`
            // reads as "block indefinitely"). `fire_expired` still checks the
            // unclamped `<= 0` expiry below.
            let remaining = remaining_ms(record, now).max(0);
            min = Some(match min {
                Some(m) => m.min(remaining),
                None => remaining,
            });
        }

        min
    }

    /// Fires every enabled, expired timer. Re-checked against the
    /// callback-list serial and recursion depth after every invocation by
    /// the caller (see `mainloop::Loop::iterate`); this only computes
    /// expiry and fires, it does not itself bail out.
    pub fn fire_expired(&mut self) -> bool {
        let now = Instant::now();
        let mut fired = false;

        let keys: Vec<usize> = self.timers.iter().map(|(k, _)| k).collect();
        for key in keys {
            let Some(record) = self.timers.get_mut(key) else {
                continue;
            };
            if !record.timer.enabled() {
                continue;
            }
            if remaining_ms(record, now) <= 0 {
                record.last = now;
                record.timer.fire();
                fired = true;
            }
        }

        fired
    }
}

/// `remaining = deadline - now`, saturated to `i32::MAX`; if the clock
/// went backward and remaining exceeds the interval, the deadline is
/// reset to `now + interval`.
fn remaining_ms(record: &mut TimerRecord, now: Instant) -> i32 {
    let interval_ms = record.timer.interval_ms() as i64;
    let remaining_us = interval_ms * 1000 - record.last.micros_until(now);
    let remaining_ms = (remaining_us / 1000).clamp(i32::MIN as i64, i32::MAX as i64) as i32;

    if remaining_ms as i64 > interval_ms {
        record.last = now;
        interval_ms as i32
    } else {
        remaining_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTimer {
        interval_ms: u32,
    }

    impl Timer for StubTimer {
        fn interval_ms(&self) -> u32 {
            self.interval_ms
        }
        fn enabled(&self) -> bool {
            true
        }
        fn needs_restart(&self) -> bool {
            false
        }
        fn mark_restarted(&self) {}
        fn fire(&self) {}
    }

    /// Mirrors `check_timeout`'s clock-regression branch: if the clock
    /// jumps backward so `last` is ahead of `now`, the deadline is reset
    /// to `now + interval` rather than reporting a huge bogus remaining.
    #[test]
    fn remaining_ms_resets_on_clock_regression() {
        let timer: Arc<dyn Timer> = Arc::new(StubTimer { interval_ms: 100 });
        let now = Instant::now();
        let mut record = TimerRecord { timer, last: Instant { sec: now.sec + 10, usec: now.usec } };

        let remaining = remaining_ms(&mut record, now);

        assert_eq!(remaining, 100);
        assert_eq!(record.last, now);
    }

    /// An overdue timer (already past its deadline when checked) must
    /// report a non-positive remaining so `min_remaining_ms` can clamp it
    /// to 0 instead of feeding a negative "block forever" timeout to the
    /// poll, while `fire_expired` still sees it as expired.
    #[test]
    fn remaining_ms_is_negative_when_overdue() {
        let timer: Arc<dyn Timer> = Arc::new(StubTimer { interval_ms: 10 });
        let now = Instant::now();
        let overdue_last = Instant { sec: now.sec.saturating_sub(1), usec: now.usec };
        let mut record = TimerRecord { timer, last: overdue_last };

        assert!(remaining_ms(&mut record, now) < 0);
    }

    #[test]
    fn min_remaining_ms_clamps_overdue_timer_to_zero() {
        let mut registry = TimerRegistry::new();
        let timer = Arc::new(StubTimer { interval_ms: 10 });
        let key = registry.add_timer(timer);

        // Force the freshly-added timer's `last` a full second into the
        // past so it is overdue the instant we ask for its remaining time.
        let record = registry.timers.get_mut(key).unwrap();
        record.last.sec = record.last.sec.saturating_sub(1);

        assert_eq!(registry.min_remaining_ms(), Some(0));
    }
}
