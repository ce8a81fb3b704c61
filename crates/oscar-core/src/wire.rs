//! Low-level OSC wire primitives
//!
//! Everything on the wire is big-endian and 4-byte aligned. Strings are NUL
//! terminated and padded with further NULs; blobs carry an `int32` length
//! prefix and are padded the same way.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ParseErrorKind, SerializeError};

/// Round `len` up to the next multiple of 4
#[inline]
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Read cursor over a complete OSC buffer.
///
/// Offsets reported in errors are relative to the start of the buffer the
/// cursor was created over.
#[derive(Debug, Clone)]
pub struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ParseErrorKind> {
        let have = self.remaining();
        if n > have {
            return Err(ParseErrorKind::Truncated { needed: n, have });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ParseErrorKind> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32, ParseErrorKind> {
        Ok(self.take(4)?.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseErrorKind> {
        Ok(self.take(4)?.get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64, ParseErrorKind> {
        Ok(self.take(8)?.get_i64())
    }

    pub fn read_u64(&mut self) -> Result<u64, ParseErrorKind> {
        Ok(self.take(8)?.get_u64())
    }

    pub fn read_f32(&mut self) -> Result<f32, ParseErrorKind> {
        Ok(self.take(4)?.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, ParseErrorKind> {
        Ok(self.take(8)?.get_f64())
    }

    /// Read a NUL terminated, zero padded UTF-8 string
    pub fn read_str(&mut self) -> Result<&'a str, ParseErrorKind> {
        let start = self.pos;
        let rest = &self.data[start..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ParseErrorKind::UnterminatedString(start))?;

        let total = padded_len(nul + 1);
        if total > rest.len() {
            return Err(ParseErrorKind::Truncated {
                needed: total,
                have: rest.len(),
            });
        }
        if let Some(i) = rest[nul + 1..total].iter().position(|&b| b != 0) {
            return Err(ParseErrorKind::InvalidPadding(start + nul + 1 + i));
        }

        let text =
            std::str::from_utf8(&rest[..nul]).map_err(|_| ParseErrorKind::InvalidUtf8(start))?;
        self.pos += total;
        Ok(text)
    }

    /// Read `len` payload bytes followed by zero padding up to alignment
    pub fn read_padded(&mut self, len: usize) -> Result<&'a [u8], ParseErrorKind> {
        let start = self.pos;
        let padded = self.take(padded_len(len))?;
        if let Some(i) = padded[len..].iter().position(|&b| b != 0) {
            return Err(ParseErrorKind::InvalidPadding(start + len + i));
        }
        Ok(&padded[..len])
    }

    /// Read an `int32` length-prefixed blob
    pub fn read_blob(&mut self) -> Result<Bytes, ParseErrorKind> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(ParseErrorKind::InvalidBlobLength(len));
        }
        let data = self.read_padded(len as usize)?;
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Write `s` with a NUL terminator and zero padding
pub fn put_padded_str(buf: &mut BytesMut, s: &str) -> Result<(), SerializeError> {
    if s.as_bytes().contains(&0) {
        return Err(SerializeError::EmbeddedNul);
    }
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, padded_len(s.len() + 1) - s.len());
    Ok(())
}

/// Write `data` followed by zero padding, without a length prefix
pub fn put_padded(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(data);
    buf.put_bytes(0, padded_len(data.len()) - data.len());
}

/// Write an `int32` length-prefixed blob
pub fn put_blob(buf: &mut BytesMut, data: &[u8]) -> Result<(), SerializeError> {
    let len = i32::try_from(data.len()).map_err(|_| SerializeError::TooLarge(data.len()))?;
    buf.put_i32(len);
    put_padded(buf, data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(5), 8);
    }

    #[test]
    fn test_string_padding() {
        let mut buf = BytesMut::new();
        put_padded_str(&mut buf, "/int").unwrap();
        assert_eq!(&buf[..], b"/int\0\0\0\0");

        let mut buf = BytesMut::new();
        put_padded_str(&mut buf, "").unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let mut buf = BytesMut::new();
        assert_eq!(
            put_padded_str(&mut buf, "a\0b"),
            Err(SerializeError::EmbeddedNul)
        );
    }

    #[test]
    fn test_read_str() {
        let data = b"abc\0defg\0\0\0\0";
        let mut input = Input::new(data);
        assert_eq!(input.read_str().unwrap(), "abc");
        assert_eq!(input.read_str().unwrap(), "defg");
        assert!(input.is_empty());
    }

    #[test]
    fn test_read_str_bad_padding() {
        let data = b"ab\0x";
        let mut input = Input::new(data);
        assert_eq!(input.read_str(), Err(ParseErrorKind::InvalidPadding(3)));
    }

    #[test]
    fn test_read_str_unterminated() {
        let data = b"abcd";
        let mut input = Input::new(data);
        assert_eq!(input.read_str(), Err(ParseErrorKind::UnterminatedString(0)));
    }

    #[test]
    fn test_blob() {
        let mut buf = BytesMut::new();
        put_blob(&mut buf, &[0xFF, 0, 1]).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 3, 255, 0, 1, 0]);

        let mut input = Input::new(&buf);
        assert_eq!(&input.read_blob().unwrap()[..], &[0xFF, 0, 1]);
    }

    #[test]
    fn test_negative_blob_length() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut input = Input::new(&data);
        assert_eq!(
            input.read_blob(),
            Err(ParseErrorKind::InvalidBlobLength(-1))
        );
    }

    #[test]
    fn test_truncated() {
        let mut input = Input::new(&[0, 0]);
        assert_eq!(
            input.read_i32(),
            Err(ParseErrorKind::Truncated { needed: 4, have: 2 })
        );
    }
}
