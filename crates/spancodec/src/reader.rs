use crate::error::{Error, Result};

/// Wire type of a varint-encoded value.
pub(crate) const WIRETYPE_VARINT: u8 = 0;
/// Wire type of an 8-byte little-endian value.
pub(crate) const WIRETYPE_FIXED64: u8 = 1;
/// Wire type of a length-prefixed value (strings, bytes, messages).
pub(crate) const WIRETYPE_LENGTH_DELIMITED: u8 = 2;
/// Wire type of a 4-byte little-endian value.
pub(crate) const WIRETYPE_FIXED32: u8 = 5;

/// A cursor over a borrowed byte range.
///
/// The range is the entire addressable input: bytes before or after it in a
/// larger backing array are never read, and "bytes available" in errors is
/// always relative to the range. Reads never copy out of the source.
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadBuffer<'a> {
    pub fn wrap(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// A view of `length` bytes of `backing`, starting at `offset`.
    /// Returns `None` if the window doesn't fit inside `backing`.
    pub fn window(backing: &'a [u8], offset: usize, length: usize) -> Option<Self> {
        let end = offset.checked_add(length)?;
        backing.get(offset..end).map(Self::wrap)
    }

    /// Number of unread bytes.
    pub fn available(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// The unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Read a single byte. Running out here means the structure is broken,
    /// not that a declared length was wrong.
    pub(crate) fn byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or(Error::Malformed(None))?;
        self.pos += 1;
        Ok(b)
    }

    /// Read `n` bytes as a slice of the source.
    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure_length(n as u64)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Read a variable-length unsigned integer.
    pub(crate) fn uvarint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let b = self.byte()?;
            result |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(Error::malformed("invalid varint"));
            }
        }
    }

    /// Read a little-endian u64.
    pub(crate) fn fixed64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        Ok(b.iter().rev().fold(0, |acc, &x| (acc << 8) | x as u64))
    }

    /// Read a field key, returning the field number and wire type.
    pub(crate) fn key(&mut self) -> Result<(u32, u8)> {
        let key = self.uvarint()?;
        let field = u32::try_from(key >> 3)
            .map_err(|_| Error::malformed(format!("invalid field number {}", key >> 3)))?;
        Ok((field, (key & 0x07) as u8))
    }

    /// Read a length prefix, failing if it exceeds the remaining bytes.
    pub(crate) fn length(&mut self) -> Result<usize> {
        let len = self.uvarint()?;
        self.ensure_length(len)?;
        Ok(len as usize)
    }

    /// Read a length-prefixed value as a nested buffer.
    pub(crate) fn length_delimited(&mut self) -> Result<ReadBuffer<'a>> {
        let len = self.length()?;
        self.bytes(len).map(ReadBuffer::wrap)
    }

    /// Read a length-prefixed UTF-8 string. Invalid UTF-8 is replaced.
    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.length()?;
        let bytes = self.bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Skip a value of the given wire type.
    pub(crate) fn skip(&mut self, wire_type: u8) -> Result<()> {
        match wire_type {
            WIRETYPE_VARINT => self.uvarint().map(drop),
            WIRETYPE_FIXED64 => self.bytes(8).map(drop),
            WIRETYPE_LENGTH_DELIMITED => {
                let len = self.length()?;
                self.bytes(len).map(drop)
            }
            WIRETYPE_FIXED32 => self.bytes(4).map(drop),
            other => Err(Error::malformed(format!("invalid wire type {other}"))),
        }
    }

    fn ensure_length(&self, declared: u64) -> Result<()> {
        let available = self.available();
        if declared > available as u64 {
            return Err(Error::truncated(declared, available));
        }
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for ReadBuffer<'a> {
    fn from(data: &'a [u8]) -> Self {
        ReadBuffer::wrap(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ReadBuffer<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        ReadBuffer::wrap(data)
    }
}

impl<'a> From<&'a Vec<u8>> for ReadBuffer<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        ReadBuffer::wrap(data)
    }
}

impl<'a> From<&'a bytes::Bytes> for ReadBuffer<'a> {
    fn from(data: &'a bytes::Bytes) -> Self {
        ReadBuffer::wrap(data)
    }
}

/// Big-endian u64 from up to 8 bytes.
pub(crate) fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &x| (acc << 8) | x as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_uvarint() {
        let mut r = ReadBuffer::wrap(&[0x00]);
        assert_eq!(r.uvarint().unwrap(), 0);

        let mut r = ReadBuffer::wrap(&[0x7F]);
        assert_eq!(r.uvarint().unwrap(), 127);

        let mut r = ReadBuffer::wrap(&[0x80, 0x01]);
        assert_eq!(r.uvarint().unwrap(), 128);

        let mut r = ReadBuffer::wrap(&[0xAC, 0x02]);
        assert_eq!(r.uvarint().unwrap(), 300);
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_uvarint_too_long() {
        let data = [0xFF; 11];
        let mut r = ReadBuffer::wrap(&data);
        assert_eq!(r.uvarint(), Err(Error::malformed("invalid varint")));
    }

    #[test]
    fn test_reader_uvarint_eof_is_malformed() {
        let mut r = ReadBuffer::wrap(&[0x80]);
        assert_eq!(r.uvarint(), Err(Error::Malformed(None)));
    }

    #[test]
    fn test_reader_fixed64() {
        let data = 1472470996199000u64.to_le_bytes();
        let mut r = ReadBuffer::wrap(&data);
        assert_eq!(r.fixed64().unwrap(), 1472470996199000);
    }

    #[test]
    fn test_reader_length_truncated() {
        // Length 5, but only 3 bytes follow.
        let mut r = ReadBuffer::wrap(&[0x05, b'a', b'b', b'c']);
        assert_eq!(r.length(), Err(Error::truncated(5, 3)));
    }

    #[test]
    fn test_reader_string() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut r = ReadBuffer::wrap(&data);
        assert_eq!(r.string().unwrap(), "hello");

        let mut r = ReadBuffer::wrap(&[0x00]);
        assert_eq!(r.string().unwrap(), "");
    }

    #[test]
    fn test_reader_string_invalid_utf8() {
        let data = [0x03, 0xFF, 0xFE, 0xFD];
        let mut r = ReadBuffer::wrap(&data);
        assert!(r.string().unwrap().contains('\u{FFFD}'));
    }

    #[test]
    fn test_reader_key() {
        let mut r = ReadBuffer::wrap(&[0x0a]);
        assert_eq!(r.key().unwrap(), (1, WIRETYPE_LENGTH_DELIMITED));
        let mut r = ReadBuffer::wrap(&[0x68]);
        assert_eq!(r.key().unwrap(), (13, WIRETYPE_VARINT));
    }

    #[test]
    fn test_reader_skip() {
        let mut data = vec![0x96, 0x01];
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[0x02, 0xAA, 0xBB]);
        data.extend_from_slice(&[0u8; 4]);
        let mut r = ReadBuffer::wrap(&data);
        r.skip(WIRETYPE_VARINT).unwrap();
        r.skip(WIRETYPE_FIXED64).unwrap();
        r.skip(WIRETYPE_LENGTH_DELIMITED).unwrap();
        r.skip(WIRETYPE_FIXED32).unwrap();
        assert!(r.is_empty());

        let mut r = ReadBuffer::wrap(&[]);
        assert_eq!(r.skip(3), Err(Error::malformed("invalid wire type 3")));
    }

    #[test]
    fn test_window_bounds() {
        let backing = [9, 9, 9, 9, 0x02, b'h', b'i', 9, 9];
        let mut r = ReadBuffer::window(&backing, 4, 3).unwrap();
        assert_eq!(r.available(), 3);
        assert_eq!(r.string().unwrap(), "hi");
        assert!(r.is_empty());

        assert!(ReadBuffer::window(&backing, 4, 6).is_none());
        assert!(ReadBuffer::window(&backing, usize::MAX, 2).is_none());
    }

    #[test]
    fn test_window_reports_available_relative_to_window() {
        // Declares 5 bytes; the backing array has them, the window doesn't.
        let backing = [0x05, b'a', b'b', b'c', b'd', b'e'];
        let mut r = ReadBuffer::window(&backing, 0, 3).unwrap();
        assert_eq!(r.length(), Err(Error::truncated(5, 2)));
    }

    #[test]
    fn test_be_u64() {
        assert_eq!(be_u64(&[0, 0, 0, 0, 0, 0, 0x01, 0x02]), 0x0102);
        assert_eq!(be_u64(&0x6b221d5bc9e6496cu64.to_be_bytes()), 0x6b221d5bc9e6496c);
    }
}
