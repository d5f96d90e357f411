//! Single-threaded event-loop core for IPC-style libraries: `epoll`/`poll`
//! fd multiplexing, timers and a deferred-dispatch queue on one thread.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use loopio::{Loop, Ready, Watch, WatchFlags};
//!
//! struct Stdin(WatchFlags);
//!
//! impl Watch for Stdin {
//!     fn fd(&self) -> std::os::unix::io::RawFd { 0 }
//!     fn interest(&self) -> Ready { Ready::readable() }
//!     fn enabled(&self) -> bool { true }
//!     fn handle(&self, _events: Ready) -> bool { true }
//!     fn invalidate(&self) {}
//!     fn oom_last_time(&self) -> bool { self.0.oom_last_time() }
//!     fn set_oom_last_time(&self, v: bool) { self.0.set_oom_last_time(v) }
//! }
//!
//! let mut mainloop = Loop::new().unwrap();
//! mainloop.add_watch(Arc::new(Stdin(WatchFlags::new())));
//! mainloop.iterate(false);
//! ```

mod connection;
mod dispatch;
mod mainloop;
mod pollable;
mod ready;
mod registry;
mod sys;
mod timer;
mod timers;
mod watch;

pub use connection::{Connection, DispatchStatus};
pub use mainloop::Loop;
pub use pollable::{Event, Pollable};
pub use ready::Ready;
pub use timer::Timer;
pub use watch::{Watch, WatchFlags};
