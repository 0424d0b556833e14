//! Mouse report decoding
//!
//! Handles the four report encodings a terminal may be switched into:
//!
//! - X10 / normal (`ESC [ M Cb Cx Cy`, each value offset by 32)
//! - UTF-8 extended (mode 1005, same layout but values are UTF-8 codepoints)
//! - SGR (`ESC [ < Cb ; Cx ; Cy M|m`, mode 1006)
//! - urxvt (`ESC [ Cb ; Cx ; Cy M`, mode 1015)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{Modifiers, MouseButton, MouseEvent, MouseEventKind};
use crate::utf8::{Utf8Decoder, Utf8Result};

/// Active mouse reporting protocol
///
/// Only two forms depend on the mode. The coordinates after `ESC [ M` are
/// read as UTF-8 in `Utf8Extended`, and `CSI Cb ; x ; y M` is a urxvt report
/// only in `Urxvt`, since elsewhere it can be a key. SGR reports and the
/// legacy `ESC [ M` form have no other meaning and are decoded in every mode,
/// `None` included, so a report that races a mode change is not lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseTrackingMode {
    /// No mouse reporting requested
    #[default]
    None,
    /// Legacy byte encoding
    X10,
    /// Legacy layout with UTF-8 encoded values (mode 1005)
    #[serde(rename = "utf8")]
    Utf8Extended,
    /// Decimal parameters with explicit release (mode 1006)
    Sgr,
    /// Decimal parameters, legacy button encoding (mode 1015)
    Urxvt,
}

impl MouseTrackingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MouseTrackingMode::None => "none",
            MouseTrackingMode::X10 => "x10",
            MouseTrackingMode::Utf8Extended => "utf8",
            MouseTrackingMode::Sgr => "sgr",
            MouseTrackingMode::Urxvt => "urxvt",
        }
    }
}

impl fmt::Display for MouseTrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseTrackingMode {
    type Err = MouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(MouseTrackingMode::None),
            "x10" | "normal" | "1000" => Ok(MouseTrackingMode::X10),
            "utf8" | "utf-8" | "1005" => Ok(MouseTrackingMode::Utf8Extended),
            "sgr" | "1006" => Ok(MouseTrackingMode::Sgr),
            "urxvt" | "1015" => Ok(MouseTrackingMode::Urxvt),
            _ => Err(MouseError::UnknownMode(s.to_string())),
        }
    }
}

/// Why a mouse report was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MouseError {
    #[error("button code {0} out of range")]
    ButtonCode(u32),
    #[error("expected 3 parameters, got {0}")]
    ParameterCount(usize),
    #[error("coordinate value {0} below encoding offset")]
    Coordinate(u32),
    #[error("unknown mouse mode '{0}'")]
    UnknownMode(String),
}

/// Offset added to every legacy value so it lands in printable range
const LEGACY_OFFSET: u32 = 32;

/// Decode a button code into an event.
///
/// Bit layout (xterm): low two bits select the button, 4/8/16 are
/// Shift/Alt/Ctrl, 32 marks motion, 64 selects the wheel group and 128 the
/// extra buttons 8-11. `release` is only set by SGR reports.
pub fn decode_button(cb: u32, x: u32, y: u32, release: bool) -> Result<MouseEvent, MouseError> {
    if cb > 0xFF || (cb & 64 != 0 && cb & 128 != 0) {
        return Err(MouseError::ButtonCode(cb));
    }

    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let low = cb & 0b11;
    let motion = cb & 32 != 0;

    let (kind, button) = if cb & 64 != 0 {
        let button = match low {
            0 => MouseButton::WheelUp,
            1 => MouseButton::WheelDown,
            2 => MouseButton::WheelLeft,
            _ => MouseButton::WheelRight,
        };
        (MouseEventKind::Wheel, button)
    } else {
        let button = if cb & 128 != 0 {
            MouseButton::Extra(8 + low as u8)
        } else {
            match low {
                0 => MouseButton::Left,
                1 => MouseButton::Middle,
                2 => MouseButton::Right,
                _ => MouseButton::None,
            }
        };
        let kind = if motion {
            if button == MouseButton::None {
                MouseEventKind::Move
            } else {
                MouseEventKind::Drag
            }
        } else if release || button == MouseButton::None {
            MouseEventKind::Release
        } else {
            MouseEventKind::Press
        };
        (kind, button)
    };

    Ok(MouseEvent {
        kind,
        button,
        x: clamp(x),
        y: clamp(y),
        modifiers,
    })
}

/// Decode the three values of a legacy report (`ESC [ M` payload)
pub fn decode_legacy(values: [u32; 3]) -> Result<MouseEvent, MouseError> {
    let [cb, cx, cy] = values;
    let cb = cb.checked_sub(LEGACY_OFFSET).ok_or(MouseError::ButtonCode(cb))?;
    let x = cx
        .checked_sub(LEGACY_OFFSET + 1)
        .ok_or(MouseError::Coordinate(cx))?;
    let y = cy
        .checked_sub(LEGACY_OFFSET + 1)
        .ok_or(MouseError::Coordinate(cy))?;
    decode_button(cb, x, y, false)
}

/// Decode an SGR report from its parameters; `release` is set for final `m`
pub fn decode_sgr(params: &[u32], release: bool) -> Result<MouseEvent, MouseError> {
    let [cb, x, y] = three(params)?;
    decode_button(cb, x.saturating_sub(1), y.saturating_sub(1), release)
}

/// Decode a urxvt report; the button keeps its legacy offset
pub fn decode_urxvt(params: &[u32]) -> Result<MouseEvent, MouseError> {
    let [cb, x, y] = three(params)?;
    let cb = cb.checked_sub(LEGACY_OFFSET).ok_or(MouseError::ButtonCode(cb))?;
    decode_button(cb, x.saturating_sub(1), y.saturating_sub(1), false)
}

fn three(params: &[u32]) -> Result<[u32; 3], MouseError> {
    match params {
        &[a, b, c] => Ok([a, b, c]),
        _ => Err(MouseError::ParameterCount(params.len())),
    }
}

fn clamp(value: u32) -> u16 {
    value.min(u32::from(u16::MAX)) as u16
}

/// Progress of a legacy payload collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    NeedMore,
    Complete([u32; 3]),
    /// The byte cannot belong to a report. With `retry` set it must be
    /// processed again as ordinary input.
    Invalid { retry: bool },
}

/// Collects the three values that follow `ESC [ M`.
///
/// Values are single bytes, or UTF-8 sequences in extended mode.
#[derive(Debug, Clone, Default)]
pub struct LegacyReport {
    utf8: bool,
    values: [u32; 3],
    count: usize,
    decoder: Utf8Decoder,
}

impl LegacyReport {
    pub fn new(utf8: bool) -> Self {
        Self {
            utf8,
            ..Self::default()
        }
    }

    /// Values collected so far
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && !self.decoder.is_pending()
    }

    pub fn push(&mut self, byte: u8) -> Collect {
        let value = if self.utf8 && (byte >= 0x80 || self.decoder.is_pending()) {
            match self.decoder.feed(byte) {
                Utf8Result::NeedMore => return Collect::NeedMore,
                Utf8Result::Complete { ch, .. } => u32::from(ch),
                Utf8Result::Invalid { retry, .. } => return Collect::Invalid { retry },
            }
        } else {
            u32::from(byte)
        };

        if value < LEGACY_OFFSET {
            return Collect::Invalid { retry: true };
        }
        self.values[self.count] = value;
        self.count += 1;
        if self.count == 3 {
            Collect::Complete(self.values)
        } else {
            Collect::NeedMore
        }
    }
}
