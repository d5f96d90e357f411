use std::io;
use std::os::unix::io::RawFd;

use indexmap::IndexMap;

use crate::ready::Ready;

/// One ready event: which fd, and what happened to it.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub fd: RawFd,
    pub ready: Ready,
}

/// Portable `poll(2)` fallback for non-Linux targets. `poll(2)` has no
/// kernel-side per-fd state to preserve, so `disable` just zeroes the
/// fd's interest bits in the in-memory table; no edge-triggered trick is
/// needed the way the epoll backend needs one.
pub struct Backend {
    fds: IndexMap<RawFd, Ready>,
}

impl Backend {
    pub fn new() -> io::Result<Backend> {
        Ok(Backend { fds: IndexMap::new() })
    }

    pub fn add(&mut self, fd: RawFd, flags: Ready, enabled: bool) -> bool {
        if self.fds.contains_key(&fd) {
            log::warn!("fd {fd} added and then added again");
            return false;
        }
        self.fds.insert(fd, if enabled { flags } else { Ready::empty() });
        true
    }

    pub fn remove(&mut self, fd: RawFd) {
        if self.fds.shift_remove(&fd).is_none() {
            log::warn!("error when trying to remove fd {fd}: not registered");
        }
    }

    pub fn enable(&mut self, fd: RawFd, flags: Ready) {
        match self.fds.get_mut(&fd) {
            Some(slot) => *slot = flags,
            None => log::warn!("fd {fd} enabled before it was added"),
        }
    }

    pub fn disable(&mut self, fd: RawFd) {
        match self.fds.get_mut(&fd) {
            Some(slot) => *slot = Ready::empty(),
            None => log::warn!("error when trying to watch fd {fd}: not registered"),
        }
    }

    pub fn poll(&mut self, out: &mut [Event], timeout_ms: i32) -> io::Result<usize> {
        let mut pollfds: Vec<libc::pollfd> = self
            .fds
            .iter()
            .map(|(&fd, &interest)| libc::pollfd {
                fd,
                events: to_poll_bits(interest),
                revents: 0,
            })
            .collect();

        let ret = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        let mut n = 0;
        for pollfd in &pollfds {
            if pollfd.revents == 0 {
                continue;
            }
            if n >= out.len() {
                break;
            }
            out[n] = Event {
                fd: pollfd.fd,
                ready: from_poll_bits(pollfd.revents),
            };
            n += 1;
        }

        Ok(n)
    }
}

fn to_poll_bits(flags: Ready) -> i16 {
    let mut bits = 0;
    if flags.is_readable() {
        bits |= libc::POLLIN;
    }
    if flags.is_writable() {
        bits |= libc::POLLOUT;
    }
    bits as i16
}

fn from_poll_bits(bits: i16) -> Ready {
    let bits = bits as i32;
    let mut ready = Ready::empty();
    if bits & libc::POLLIN != 0 {
        ready.insert(Ready::readable());
    }
    if bits & libc::POLLOUT != 0 {
        ready.insert(Ready::writable());
    }
    if bits & libc::POLLERR != 0 {
        ready.insert(Ready::error());
    }
    if bits & libc::POLLHUP != 0 {
        ready.insert(Ready::hup());
    }
    if bits & libc::POLLNVAL != 0 {
        ready.insert(Ready::invalid());
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_enable_disable_remove_pipe() {
        let mut backend = Backend::new().unwrap();
        let mut fds = [0; 2];
        unsafe { libc::pipe(fds.as_mut_ptr()) };
        let (r, w) = (fds[0], fds[1]);

        assert!(backend.add(r, Ready::readable(), true));
        unsafe { libc::write(w, b"x".as_ptr() as *const _, 1) };

        let mut events = [Event { fd: 0, ready: Ready::empty() }; 8];
        let n = backend.poll(&mut events, 1000).unwrap();
        assert_eq!(n, 1);
        assert_eq!(events[0].fd, r);
        assert!(events[0].ready.is_readable());

        backend.disable(r);
        let n = backend.poll(&mut events, 0).unwrap();
        assert_eq!(n, 0);

        backend.enable(r, Ready::readable());
        let n = backend.poll(&mut events, 1000).unwrap();
        assert_eq!(n, 1);

        backend.remove(r);
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }
}
