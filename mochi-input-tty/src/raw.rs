//! Raw mode for the controlling terminal

use std::os::fd::AsFd;

use log::warn;
use nix::errno::Errno;
use nix::sys::termios::{self, SetArg, Termios};

use crate::error::{Error, Result};

/// Puts a terminal into raw mode and restores the saved settings on drop
pub struct RawMode<F: AsFd> {
    fd: F,
    saved: Termios,
}

impl<F: AsFd> RawMode<F> {
    /// Switch `fd` to raw mode.
    ///
    /// Canonical mode, echo, signal keys and input translation are disabled
    /// and reads return as soon as one byte is available. Output
    /// post-processing is left on so `\n` still moves to column 0.
    pub fn enable(fd: F) -> Result<Self> {
        let saved = termios::tcgetattr(fd.as_fd()).map_err(not_a_terminal)?;

        let mut raw = saved.clone();
        raw.input_flags &= !(termios::InputFlags::IGNBRK
            | termios::InputFlags::BRKINT | termios::InputFlags::PARMRK
            | termios::InputFlags::ISTRIP | termios::InputFlags::INLCR
            | termios::InputFlags::IGNCR | termios::InputFlags::ICRNL
            | termios::InputFlags::IXON);
        raw.output_flags |= termios::OutputFlags::OPOST | termios::OutputFlags::ONLCR;
        raw.local_flags &= !(termios::LocalFlags::ECHO | termios::LocalFlags::ECHONL
            | termios::LocalFlags::ICANON | termios::LocalFlags::ISIG
            | termios::LocalFlags::IEXTEN);
        raw.control_flags &= !(termios::ControlFlags::CSIZE | termios::ControlFlags::PARENB);
        raw.control_flags |= termios::ControlFlags::CS8;
        raw.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(fd.as_fd(), SetArg::TCSANOW, &raw)?;

        Ok(Self { fd, saved })
    }

    pub fn get_ref(&self) -> &F {
        &self.fd
    }

    /// The settings that will be restored
    pub fn saved(&self) -> &Termios {
        &self.saved
    }
}

impl<F: AsFd> Drop for RawMode<F> {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &self.saved) {
            warn!("Failed to restore terminal settings: {}", e);
        }
    }
}

fn not_a_terminal(errno: Errno) -> Error {
    match errno {
        Errno::ENOTTY | Errno::EINVAL => Error::NotATerminal,
        other => Error::Nix(other),
    }
}
