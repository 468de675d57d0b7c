// src/os/poll.rs

//! This module provides a wrapper around `poll(2)` using raw `libc` FFI calls
//! for waiting on a small, fixed set of file descriptors. Unlike epoll it
//! accepts regular files, which are always reported readable.

use anyhow::{Context, Result};
use bitflags::bitflags;
use log::trace;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollFlags: libc::c_short {
        const POLLIN = libc::POLLIN;
        const POLLPRI = libc::POLLPRI;
        const POLLOUT = libc::POLLOUT;
        const POLLERR = libc::POLLERR;
        const POLLHUP = libc::POLLHUP;
        const POLLNVAL = libc::POLLNVAL;
    }
}

/// Token identifying a descriptor registered with an [`EventMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(usize);

#[derive(Default)]
pub struct EventMonitor {
    fds: Vec<libc::pollfd>,
}

/// Converts a timeout to poll's milliseconds, rounding up so a wait never
/// ends before the requested duration. `None` blocks indefinitely.
fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_nanos().div_ceil(1_000_000);
            libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
        }
    }
}

impl EventMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fd: RawFd, flags: PollFlags) -> Token {
        self.fds.push(libc::pollfd {
            fd,
            events: flags.bits(),
            revents: 0,
        });
        trace!("EventMonitor: watching fd {} for {:?}", fd, flags);
        Token(self.fds.len() - 1)
    }

    /// Blocks until a descriptor is ready or the timeout passes.
    ///
    /// Returns the number of ready descriptors; 0 on timeout or `EINTR`.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<usize> {
        for pfd in &mut self.fds {
            pfd.revents = 0;
        }
        let ms = timeout_ms(timeout);
        trace!("EventMonitor: polling {} fds, timeout {}ms", self.fds.len(), ms);

        let ready = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                ms,
            )
        };
        if ready == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("EventMonitor: poll interrupted (EINTR)");
                return Ok(0);
            }
            return Err(err).context("poll failed in EventMonitor");
        }
        Ok(ready as usize)
    }

    /// Events reported for `token` by the last `wait`.
    pub fn ready(&self, token: Token) -> PollFlags {
        self.fds
            .get(token.0)
            .map(|pfd| PollFlags::from_bits_truncate(pfd.revents))
            .unwrap_or_default()
    }
}
