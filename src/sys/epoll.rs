use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use crate::ready::Ready;

const N_STACK_DESCRIPTORS: usize = 64;

/// One ready event: which fd, and what happened to it.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub fd: RawFd,
    pub ready: Ready,
}

/// epoll(7)-backed pollable set. Fds are always added; `disable` never
/// removes kernel state, it just switches to edge-triggered with an empty
/// mask so a later `enable` can't fail for lack of resources.
pub struct Backend {
    epfd: RawFd,
}

impl Backend {
    pub fn new() -> io::Result<Backend> {
        let epfd = super::syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Backend { epfd })
    }

    pub fn add(&self, fd: RawFd, flags: Ready, enabled: bool) -> bool {
        let mut event = libc::epoll_event {
            events: if enabled { to_epoll_bits(flags) } else { libc::EPOLLET as u32 },
            u64: fd as u64,
        };

        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut event) } == 0 {
            return true;
        }

        match io::Error::last_os_error().raw_os_error() {
            Some(libc::ENOMEM) | Some(libc::ENOSPC) => {}
            Some(libc::EBADF) => log::warn!("bad fd {fd}"),
            Some(libc::EEXIST) => log::warn!("fd {fd} added and then added again"),
            Some(errno) => log::warn!("misc error when trying to watch fd {fd}: errno {errno}"),
            None => {}
        }
        false
    }

    pub fn remove(&self, fd: RawFd) {
        let mut dummy = libc::epoll_event { events: 0, u64: 0 };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, &mut dummy) } != 0 {
            log::warn!("error when trying to remove fd {fd}: {}", io::Error::last_os_error());
        }
    }

    pub fn enable(&self, fd: RawFd, flags: Ready) {
        let mut event = libc::epoll_event {
            events: to_epoll_bits(flags),
            u64: fd as u64,
        };

        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut event) } == 0 {
            return;
        }

        match io::Error::last_os_error().raw_os_error() {
            Some(libc::EBADF) => log::warn!("bad fd {fd}"),
            Some(libc::ENOENT) => log::warn!("fd {fd} enabled before it was added"),
            Some(libc::ENOMEM) => log::warn!("insufficient memory to change watch for fd {fd}"),
            Some(errno) => log::warn!("misc error when trying to watch fd {fd}: errno {errno}"),
            None => {}
        }
    }

    /// Switches `fd` to edge-triggered with an empty mask rather than
    /// `EPOLL_CTL_DEL`-ing it: a zero level-triggered mask still fires on
    /// `EPOLLHUP`/`EPOLLERR` and busy-loops, while a real delete risks not
    /// being able to re-add the fd under memory pressure later.
    pub fn disable(&self, fd: RawFd) {
        let mut event = libc::epoll_event {
            events: libc::EPOLLET as u32,
            u64: fd as u64,
        };

        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut event) } != 0 {
            log::warn!("error when trying to watch fd {fd}: {}", io::Error::last_os_error());
        }
    }

    pub fn poll(&self, out: &mut [Event], timeout_ms: i32) -> io::Result<usize> {
        let max = out.len().min(N_STACK_DESCRIPTORS);
        let mut raw = [libc::epoll_event { events: 0, u64: 0 }; N_STACK_DESCRIPTORS];

        let n = super::syscall!(epoll_wait(
            self.epfd,
            raw.as_mut_ptr(),
            max as i32,
            timeout_ms,
        ))?;

        for i in 0..n as usize {
            out[i] = Event {
                fd: raw[i].u64 as RawFd,
                ready: from_epoll_bits(raw[i].events),
            };
        }

        Ok(n as usize)
    }
}

impl AsRawFd for Backend {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}

fn to_epoll_bits(flags: Ready) -> u32 {
    let mut bits = 0;
    if flags.is_readable() {
        bits |= libc::EPOLLIN;
    }
    if flags.is_writable() {
        bits |= libc::EPOLLOUT;
    }
    bits as u32
}

fn from_epoll_bits(bits: u32) -> Ready {
    let bits = bits as i32;
    let mut ready = Ready::empty();
    if bits & libc::EPOLLIN != 0 {
        ready.insert(Ready::readable());
    }
    if bits & libc::EPOLLOUT != 0 {
        ready.insert(Ready::writable());
    }
    if bits & libc::EPOLLERR != 0 {
        ready.insert(Ready::error());
    }
    if bits & libc::EPOLLHUP != 0 {
        ready.insert(Ready::hup());
    }
    ready
}
