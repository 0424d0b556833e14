//! Bounded buffer for the escape sequence being assembled

use thiserror::Error;

/// The buffer is full; the byte was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("escape sequence longer than {limit} bytes")]
pub struct Overflow {
    pub limit: usize,
}

/// Append-only byte buffer with a hard capacity
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl SequenceBuffer {
    /// Create a buffer holding at most `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    /// Append a byte, refusing to grow past the limit
    pub fn push(&mut self, byte: u8) -> Result<(), Overflow> {
        if self.bytes.len() >= self.limit {
            return Err(Overflow { limit: self.limit });
        }
        self.bytes.push(byte);
        Ok(())
    }

    /// Drop the last byte, if any
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Move the contents out, leaving the buffer empty
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Keep the first `len` bytes and return the rest
    pub fn split_off(&mut self, len: usize) -> Vec<u8> {
        self.bytes.split_off(len.min(self.bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut buf = SequenceBuffer::new(3);
        assert!(buf.push(0x1B).is_ok());
        assert!(buf.push(b'[').is_ok());
        assert!(buf.push(b'1').is_ok());
        assert_eq!(buf.push(b'2'), Err(Overflow { limit: 3 }));
        assert_eq!(buf.as_slice(), b"\x1b[1");
    }

    #[test]
    fn test_take_empties() {
        let mut buf = SequenceBuffer::new(8);
        buf.push(b'a').unwrap();
        assert_eq!(buf.take(), vec![b'a']);
        assert!(buf.is_empty());
        assert_eq!(buf.limit(), 8);
    }

    #[test]
    fn test_split_off_keeps_head() {
        let mut buf = SequenceBuffer::new(8);
        for &byte in b"\x1b[[x" {
            buf.push(byte).unwrap();
        }
        assert_eq!(buf.split_off(3), b"x".to_vec());
        assert_eq!(buf.as_slice(), b"\x1b[[");
        assert!(buf.split_off(10).is_empty());
    }
}
