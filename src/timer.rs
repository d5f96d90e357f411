/// Host-owned periodic deadline.
///
/// Wrapped by the loop in a [`crate::timers::TimerRecord`] that tracks the
/// last-fire monotonic timestamp; the `Timer` itself only exposes the
/// interval and the restart protocol.
pub trait Timer: Send + Sync {
    /// Interval in milliseconds. Must be > 0.
    fn interval_ms(&self) -> u32;

    /// Whether the timer currently fires at all.
    fn enabled(&self) -> bool;

    /// True if the host wants the timer's clock restarted from "now" on
    /// the next iteration (e.g. just re-enabled after being disabled).
    fn needs_restart(&self) -> bool;

    /// Acknowledges a restart requested via `needs_restart`.
    fn mark_restarted(&self);

    /// Invoked when the timer expires.
    fn fire(&self);
}
