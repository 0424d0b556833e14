//! CSI parameter accumulation
//!
//! Parameters are built byte by byte while a CSI sequence streams in.
//! Storage is fixed-size; running out of room is reported to the caller
//! instead of silently dropping values.

use thiserror::Error;

/// Maximum number of parameters we'll track
pub const MAX_PARAMS: usize = 16;
/// Maximum number of intermediate bytes
pub const MAX_INTERMEDIATES: usize = 2;

/// Why a byte could not be added to a CSI sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsiError {
    #[error("more than {MAX_PARAMS} parameters")]
    TooManyParameters,
    #[error("parameter value overflows u32")]
    ValueOverflow,
    #[error("more than {MAX_INTERMEDIATES} intermediate bytes")]
    TooManyIntermediates,
    #[error("parameter byte after intermediate bytes")]
    ParameterAfterIntermediate,
    #[error("private marker after the first parameter byte")]
    MisplacedMarker,
}

/// CSI parameters, intermediates and final byte
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiParameters {
    /// Completed parameter values (missing values are 0)
    values: [u32; MAX_PARAMS],
    /// Number of completed parameters
    len: usize,
    /// Parameter currently being built
    current: u32,
    /// Whether any parameter byte has been seen
    started: bool,
    /// Inside a `:` sub-parameter, whose digits are skipped
    in_subparam: bool,
    /// Intermediate bytes (0x20-0x2F)
    intermediates: [u8; MAX_INTERMEDIATES],
    intermediate_len: usize,
    /// Private marker (`<`, `=`, `>`, `?`) directly after `ESC [`
    marker: Option<u8>,
    /// Final byte (0x40-0x7E), once seen
    final_byte: Option<u8>,
}

impl CsiParameters {
    /// Create empty params
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything collected so far
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record the private marker byte
    pub fn set_marker(&mut self, marker: u8) {
        self.marker = Some(marker);
    }

    /// Add a parameter byte (`0`-`9`, `;` or `:`)
    pub fn push_param_byte(&mut self, byte: u8) -> Result<(), CsiError> {
        if self.intermediate_len > 0 {
            return Err(CsiError::ParameterAfterIntermediate);
        }
        self.started = true;
        match byte {
            b'0'..=b'9' => {
                if self.in_subparam {
                    return Ok(());
                }
                self.current = self
                    .current
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u32::from(byte - b'0')))
                    .ok_or(CsiError::ValueOverflow)?;
            }
            b';' => self.complete_current()?,
            b':' => self.in_subparam = true,
            _ => {}
        }
        Ok(())
    }

    /// Add an intermediate byte (0x20-0x2F)
    pub fn push_intermediate(&mut self, byte: u8) -> Result<(), CsiError> {
        if self.intermediate_len == MAX_INTERMEDIATES {
            return Err(CsiError::TooManyIntermediates);
        }
        self.intermediates[self.intermediate_len] = byte;
        self.intermediate_len += 1;
        Ok(())
    }

    /// Record the final byte, completing the last parameter
    pub fn finish(&mut self, final_byte: u8) -> Result<(), CsiError> {
        if self.started {
            self.complete_current()?;
        }
        self.final_byte = Some(final_byte);
        Ok(())
    }

    fn complete_current(&mut self) -> Result<(), CsiError> {
        if self.len == MAX_PARAMS {
            return Err(CsiError::TooManyParameters);
        }
        self.values[self.len] = self.current;
        self.len += 1;
        self.current = 0;
        self.in_subparam = false;
        Ok(())
    }

    /// Completed parameter values
    pub fn params(&self) -> &[u32] {
        &self.values[..self.len]
    }

    /// Get raw value at index (0 for an empty slot), None if not present
    pub fn get(&self, index: usize) -> Option<u32> {
        self.params().get(index).copied()
    }

    /// Get parameter at index, treating 0 and absent as `default`
    pub fn param_or(&self, index: usize, default: u32) -> u32 {
        match self.get(index) {
            Some(0) | None => default,
            Some(v) => v,
        }
    }

    /// Get number of parameters
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether anything at all followed `ESC [`
    pub fn has_body(&self) -> bool {
        self.started || self.marker.is_some() || self.intermediate_len > 0
    }

    /// Intermediate bytes
    pub fn intermediates(&self) -> &[u8] {
        &self.intermediates[..self.intermediate_len]
    }

    /// Private marker byte
    pub fn marker(&self) -> Option<u8> {
        self.marker
    }

    /// Final byte, once the sequence is complete
    pub fn final_byte(&self) -> Option<u8> {
        self.final_byte
    }

    /// A plain sequence: no marker and no intermediates
    pub fn is_plain(&self) -> bool {
        self.marker.is_none() && self.intermediate_len == 0
    }
}
