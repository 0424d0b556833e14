//! Byte sources the reader thread pulls from

use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::error::Result;

/// Outcome of one read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer
    Data(usize),
    /// Nothing arrived within the timeout
    TimedOut,
    /// The source is exhausted
    Eof,
}

/// A blocking source of raw terminal bytes
pub trait ByteSource: Send {
    /// Wait up to `timeout` (forever if `None`) for input and read it
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<ReadOutcome>;
}

/// A file descriptor read with `poll(2)` so waits can time out
#[derive(Debug)]
pub struct FdSource<F> {
    inner: F,
}

impl<F: AsFd + Read + Send> FdSource<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &F {
        &self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Wait for the descriptor to become readable
    fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let timeout = match timeout {
            None => PollTimeout::NONE,
            Some(duration) => PollTimeout::from(millis_rounded_up(duration)),
        };
        let mut fds = [PollFd::new(self.inner.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) => Ok(false),
            // POLLHUP without POLLIN still means read() returns 0
            Ok(_) => Ok(true),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl<F: AsFd + Read + Send> ByteSource for FdSource<F> {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<ReadOutcome> {
        if !self.wait(timeout)? {
            return Ok(ReadOutcome::TimedOut);
        }
        match self.inner.read(buf) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                Ok(ReadOutcome::TimedOut)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Milliseconds for poll(2), rounded up so a wait never ends early
fn millis_rounded_up(duration: Duration) -> u16 {
    let millis = duration.as_micros().div_ceil(1000);
    u16::try_from(millis).unwrap_or(u16::MAX)
}
