// src/os/signals.rs

//! Termination signals routed to a `signalfd`.
//!
//! The signals are blocked for the calling thread, so they stay pending
//! instead of killing the process, and are read back as ordinary fd events.
//! Must be installed before any other thread is spawned; this binary never
//! spawns one.

use crate::os::poll::{EventMonitor, PollFlags};
use crate::session::{HoldOutcome, HoldPolicy, HoldWait};
use anyhow::{Context, Result};
use log::{debug, info};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

pub const TERMINATION_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
];

pub struct Interrupts {
    fd: SignalFd,
}

impl Interrupts {
    /// Redirects the default termination signals.
    pub fn install() -> Result<Self> {
        Self::for_signals(&TERMINATION_SIGNALS)
    }

    /// Blocks `signals` for this thread and opens a signalfd for them.
    ///
    /// The mask is left in place when this is dropped: a signal still pending
    /// at that point must not take the process down with its default action.
    pub fn for_signals(signals: &[Signal]) -> Result<Self> {
        let mut mask = SigSet::empty();
        for signal in signals {
            mask.add(*signal);
        }
        mask.thread_block()
            .context("Failed to block termination signals")?;
        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .context("Failed to create signalfd")?;
        debug!("Interrupts: routing {:?} to fd {}", signals, fd.as_raw_fd());
        Ok(Self { fd })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Consumes one pending signal, if any.
    pub fn take_pending(&mut self) -> Result<Option<Signal>> {
        let Some(info) = self.fd.read_signal().context("Failed to read signalfd")? else {
            return Ok(None);
        };
        let signal = Signal::try_from(info.ssi_signo as libc::c_int)
            .context("signalfd returned an unknown signal number")?;
        Ok(Some(signal))
    }

    /// Waits for a signal, up to `timeout` if one is given.
    ///
    /// Returns `None` once the full timeout has elapsed.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Option<Signal>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut monitor = EventMonitor::new();
        let token = monitor.add(self.as_raw_fd(), PollFlags::POLLIN);

        loop {
            if let Some(signal) = self.take_pending()? {
                return Ok(Some(signal));
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(None);
                    }
                    Some(left)
                }
                None => None,
            };
            if monitor.wait(remaining)? > 0 && monitor.ready(token).contains(PollFlags::POLLERR) {
                anyhow::bail!("signalfd reported an error condition");
            }
        }
    }
}

impl HoldWait for Interrupts {
    fn hold(&mut self, policy: HoldPolicy) -> Result<HoldOutcome> {
        let outcome = match self.wait(policy.duration())? {
            Some(signal) => HoldOutcome::Interrupted(signal),
            None => HoldOutcome::TimedOut,
        };
        info!("Interrupts: hold ended: {:?}", outcome);
        Ok(outcome)
    }
}
