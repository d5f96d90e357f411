use std::io;
use std::os::unix::io::RawFd;

use crate::ready::Ready;
use crate::sys;

/// One ready event reported by a poll, independent of backend.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub fd: RawFd,
    pub ready: Ready,
}

#[cfg(target_os = "linux")]
impl From<sys::epoll::Event> for Event {
    fn from(e: sys::epoll::Event) -> Event {
        Event { fd: e.fd, ready: e.ready }
    }
}

#[cfg(not(target_os = "linux"))]
impl From<sys::poll_backend::Event> for Event {
    fn from(e: sys::poll_backend::Event) -> Event {
        Event { fd: e.fd, ready: e.ready }
    }
}

/// The kernel-readiness multiplexer. Picks `epoll(7)` on Linux and falls
/// back to `poll(2)` everywhere else, at compile time — not a trait
/// object, since the backend never changes after construction.
pub struct Pollable {
    #[cfg(target_os = "linux")]
    backend: sys::epoll::Backend,
    #[cfg(not(target_os = "linux"))]
    backend: sys::poll_backend::Backend,
}

impl Pollable {
    pub fn new(_size_hint: usize) -> io::Result<Pollable> {
        #[cfg(target_os = "linux")]
        {
            Ok(Pollable { backend: sys::epoll::Backend::new()? })
        }
        #[cfg(not(target_os = "linux"))]
        {
            Ok(Pollable { backend: sys::poll_backend::Backend::new()? })
        }
    }

    pub fn add(&mut self, fd: RawFd, flags: Ready, enabled: bool) -> bool {
        self.backend.add(fd, flags, enabled)
    }

    pub fn remove(&mut self, fd: RawFd) {
        self.backend.remove(fd)
    }

    pub fn enable(&mut self, fd: RawFd, flags: Ready) {
        self.backend.enable(fd, flags)
    }

    pub fn disable(&mut self, fd: RawFd) {
        self.backend.disable(fd)
    }

    pub fn poll(&mut self, out: &mut [Event], timeout_ms: i32) -> io::Result<usize> {
        #[cfg(target_os = "linux")]
        {
            let mut raw = [sys::epoll::Event { fd: 0, ready: Ready::empty() }; 64];
            let max = out.len().min(raw.len());
            let n = self.backend.poll(&mut raw[..max], timeout_ms)?;
            for i in 0..n {
                out[i] = raw[i].into();
            }
            Ok(n)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let mut raw = vec![sys::poll_backend::Event { fd: 0, ready: Ready::empty() }; out.len()];
            let n = self.backend.poll(&mut raw, timeout_ms)?;
            for i in 0..n {
                out[i] = raw[i].into();
            }
            Ok(n)
        }
    }
}
