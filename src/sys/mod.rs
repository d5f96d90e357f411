use std::time::Duration;

macro_rules! syscall {
    ($fn:ident ( $($arg:expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg),*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub(crate) use syscall;

mod fd;
mod waker;

pub use waker::Waker;

#[cfg(target_os = "linux")]
mod eventfd;
#[cfg(target_os = "linux")]
pub use eventfd::EventFd;

#[cfg(target_os = "linux")]
pub mod epoll;

#[cfg(not(target_os = "linux"))]
pub mod poll_backend;
#[cfg(not(target_os = "linux"))]
pub use poll_backend::Backend;

/// Monotonic clock reading, `(seconds, microseconds)`, matching the split
/// the timer registry does its arithmetic in.
pub fn monotonic_time() -> (u64, u32) {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let ret = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    debug_assert_eq!(ret, 0, "clock_gettime(CLOCK_MONOTONIC) failed");
    (ts.tv_sec as u64, (ts.tv_nsec / 1000) as u32)
}

/// Cooperative sleep used for OOM backoff; never call this from inside a
/// watch/timer handler other than the dispatch queue's own retry path.
pub fn sleep_ms(n: u64) {
    if n > 0 {
        std::thread::sleep(Duration::from_millis(n));
    }
}
