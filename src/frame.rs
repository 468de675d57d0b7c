// src/frame.rs

//! Frame ingest: exactly `width * height * 3` bytes of packed RGB, no header.

use crate::display::Geometry;
use crate::os::poll::{EventMonitor, PollFlags, Token};
use crate::os::signals::Interrupts;
use log::{debug, trace};
use nix::sys::signal::Signal;
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Requires RGB data on stdin")]
    Terminal,

    #[error("Failed to read RGB data: {0}")]
    Io(#[from] io::Error),

    #[error("Expected {expected} bytes of RGB data on stdin, but only got {got} bytes")]
    Short { expected: usize, got: usize },

    #[error("Interrupted by {0:?} before the frame was complete")]
    Interrupted(Signal),
}

/// A full frame sized to a display.
#[derive(Debug)]
pub struct Frame {
    geometry: Geometry,
    pixels: Box<[u8]>,
}

impl Frame {
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Supplier of raw frame bytes.
pub trait FrameSource {
    /// Reads up to `buf.len()` bytes. `Ok(0)` means the source is exhausted.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FrameError>;
}

/// Reads exactly one frame, retrying short reads until the count is met.
pub fn read_frame(source: &mut dyn FrameSource, geometry: Geometry) -> Result<Frame, FrameError> {
    let expected = geometry.frame_len();
    let mut pixels = vec![0u8; expected].into_boxed_slice();
    let mut got = 0;
    while got < expected {
        let n = source.read_chunk(&mut pixels[got..])?;
        if n == 0 {
            return Err(FrameError::Short { expected, got });
        }
        got += n;
        trace!("Frame: {}/{} bytes", got, expected);
    }
    debug!("Frame: read {} bytes for {}", expected, geometry);
    Ok(Frame { geometry, pixels })
}

fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, FrameError> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Any blocking reader.
pub struct ReaderSource<R>(pub R);

impl<R: Read> FrameSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FrameError> {
        read_retrying(&mut self.0, buf)
    }
}

/// A descriptor-backed reader that gives up as soon as a termination signal
/// is pending, instead of blocking until the writer closes the stream.
pub struct InterruptibleSource<'a, R> {
    reader: R,
    interrupts: &'a mut Interrupts,
    monitor: EventMonitor,
    data: Token,
    signals: Token,
}

impl<'a, R: Read + AsRawFd> InterruptibleSource<'a, R> {
    pub fn new(reader: R, interrupts: &'a mut Interrupts) -> Self {
        let mut monitor = EventMonitor::new();
        let data = monitor.add(reader.as_raw_fd(), PollFlags::POLLIN);
        let signals = monitor.add(interrupts.as_raw_fd(), PollFlags::POLLIN);
        Self {
            reader,
            interrupts,
            monitor,
            data,
            signals,
        }
    }
}

impl<R: Read + AsRawFd> FrameSource for InterruptibleSource<'_, R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FrameError> {
        loop {
            self.monitor
                .wait(None)
                .map_err(|e| io::Error::other(format!("{:#}", e)))?;
            if self.monitor.ready(self.signals).contains(PollFlags::POLLIN) {
                let pending = self
                    .interrupts
                    .take_pending()
                    .map_err(|e| io::Error::other(format!("{:#}", e)))?;
                if let Some(signal) = pending {
                    return Err(FrameError::Interrupted(signal));
                }
            }
            // HUP and ERR still need a read to observe EOF or the error itself.
            if self
                .monitor
                .ready(self.data)
                .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            {
                return read_retrying(&mut self.reader, buf);
            }
            if self.monitor.ready(self.data).contains(PollFlags::POLLNVAL) {
                return Err(io::Error::from_raw_os_error(libc::EBADF).into());
            }
        }
    }
}
