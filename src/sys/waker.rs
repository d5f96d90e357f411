use std::io;
#[cfg(not(target_os = "linux"))]
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

/// Wakes a blocked `poll()` from another thread. Backed by `eventfd` on
/// Linux; a self-pipe everywhere else `poll_backend` runs.
#[derive(Debug)]
pub struct Waker {
    #[cfg(target_os = "linux")]
    inner: super::EventFd,
    #[cfg(not(target_os = "linux"))]
    reader: super::FileDesc,
    #[cfg(not(target_os = "linux"))]
    writer: super::FileDesc,
}

impl Waker {
    #[cfg(target_os = "linux")]
    pub fn new() -> io::Result<Waker> {
        Ok(Waker {
            inner: super::EventFd::new()?,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn new() -> io::Result<Waker> {
        let mut fds = [0; 2];
        super::syscall!(pipe(fds.as_mut_ptr()))?;
        for &fd in &fds {
            let flags = super::syscall!(fcntl(fd, libc::F_GETFL))?;
            super::syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
        }
        Ok(Waker {
            reader: unsafe { super::FileDesc::new(fds[0]) },
            writer: unsafe { super::FileDesc::new(fds[1]) },
        })
    }

    #[cfg(target_os = "linux")]
    pub fn wake(&self) -> io::Result<()> {
        match self.inner.write(1) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn wake(&self) -> io::Result<()> {
        match (&self.writer).write(&[1]) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn drain(&self) {
        let _ = self.inner.read();
    }

    #[cfg(not(target_os = "linux"))]
    pub fn drain(&self) {
        let mut buf = [0u8; 128];
        loop {
            match (&self.reader).read(&mut buf) {
                Ok(n) if n > 0 => {}
                _ => return,
            }
        }
    }
}

impl AsRawFd for Waker {
    #[cfg(target_os = "linux")]
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    #[cfg(not(target_os = "linux"))]
    fn as_raw_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }
}
