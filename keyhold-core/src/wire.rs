//! Length-prefixed binary wire codec.
//!
//! The agent protocol is a stream of big-endian, length-prefixed fields:
//! single opcode bytes, 4-byte unsigned integers, and strings encoded as a
//! 4-byte length followed by that many raw bytes.  [`WireReader`] consumes a
//! request buffer field by field; [`WireWriter`] accumulates a response.
//!
//! Readers never copy: `get_string` hands back a slice of the request buffer,
//! so callers decide what (if anything) to own.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer truncated")]
    Truncated,
    #[error("length prefix exceeds remaining buffer")]
    Oversized,
}

/// Sequential reader over a request buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        let b = *self.buf.get(self.pos).ok_or(WireError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        let end = self.pos.checked_add(4).ok_or(WireError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Truncated)?;
        self.pos = end;
        Ok(u32::from_be_bytes(bytes.try_into().expect("4-byte slice")))
    }

    /// Read a length-prefixed string, returning a slice of the underlying
    /// buffer.  A length prefix pointing past the end of the buffer is
    /// `Oversized`, not `Truncated` — the prefix itself was readable but lies.
    pub fn get_string(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.get_u32()? as usize;
        let end = self.pos.checked_add(len).ok_or(WireError::Oversized)?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Oversized)?;
        self.pos = end;
        Ok(bytes)
    }
}

/// Accumulating writer for a response buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_string(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Append another writer's contents verbatim (no length prefix).
    pub fn put_writer(&mut self, other: &WireWriter) {
        self.buf.extend_from_slice(&other.buf);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_u32_roundtrip() {
        let mut w = WireWriter::new();
        w.put_u8(17);
        w.put_u32(0xDEAD_BEEF);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 5);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_u8().unwrap(), 17);
        assert_eq!(r.get_u32().unwrap(), 0xDEAD_BEEF);
        assert!(r.is_empty());
    }

    #[test]
    fn u32_is_big_endian() {
        let mut w = WireWriter::new();
        w.put_u32(1);
        assert_eq!(w.as_slice(), &[0, 0, 0, 1]);
    }

    #[test]
    fn string_roundtrip() {
        let mut w = WireWriter::new();
        w.put_string(b"hello");
        w.put_string(b"");
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_string().unwrap(), b"hello");
        assert_eq!(r.get_string().unwrap(), b"");
        assert!(r.is_empty());
    }

    #[test]
    fn truncated_u32_fails() {
        let mut r = WireReader::new(&[0, 0, 1]);
        assert_eq!(r.get_u32(), Err(WireError::Truncated));
    }

    #[test]
    fn string_with_lying_length_prefix_fails() {
        // Prefix says 100 bytes, only 2 follow.
        let mut r = WireReader::new(&[0, 0, 0, 100, b'a', b'b']);
        assert_eq!(r.get_string(), Err(WireError::Oversized));
    }

    #[test]
    fn empty_buffer_has_no_opcode() {
        let mut r = WireReader::new(&[]);
        assert_eq!(r.get_u8(), Err(WireError::Truncated));
    }

    #[test]
    fn reader_does_not_advance_past_failed_read() {
        let mut r = WireReader::new(&[0, 0, 0, 9, 1, 2]);
        assert!(r.get_string().is_err());
        // The length prefix was consumed, the (short) payload was not.
        assert_eq!(r.remaining(), 2);
    }
}
