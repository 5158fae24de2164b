use bytes::{BufMut, BytesMut};

use crate::reader::{WIRETYPE_FIXED64, WIRETYPE_LENGTH_DELIMITED, WIRETYPE_VARINT};

/// A message that can be written in proto3 wire format.
///
/// `emit` is the only place a message decides which of its fields are
/// present. Both sizing and writing drive it, so the computed size and the
/// written bytes cannot disagree.
pub(crate) trait Message {
    fn emit<S: Sink>(&self, out: &mut S);

    /// Exact encoded size of the message body, excluding any key or length.
    fn size_in_bytes(&self) -> usize {
        let mut counter = SizeCounter::default();
        self.emit(&mut counter);
        counter.len
    }
}

/// Receives the present fields of a message, in field order.
pub(crate) trait Sink {
    fn varint(&mut self, field: u32, value: u64);
    fn fixed64(&mut self, field: u32, value: u64);
    fn bytes(&mut self, field: u32, value: &[u8]);
    fn message<M: Message>(&mut self, field: u32, msg: &M);

    fn string(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }
}

/// A sink that only counts bytes.
#[derive(Debug, Default)]
pub(crate) struct SizeCounter {
    len: usize,
}

impl Sink for SizeCounter {
    fn varint(&mut self, field: u32, value: u64) {
        self.len += key_size(field) + varint_size(value);
    }

    fn fixed64(&mut self, field: u32, _value: u64) {
        self.len += key_size(field) + 8;
    }

    fn bytes(&mut self, field: u32, value: &[u8]) {
        self.len += key_size(field) + varint_size(value.len() as u64) + value.len();
    }

    fn message<M: Message>(&mut self, field: u32, msg: &M) {
        let size = msg.size_in_bytes();
        self.len += key_size(field) + varint_size(size as u64) + size;
    }
}

/// A buffer for encoding proto3 messages.
pub(crate) struct WireBuffer {
    scratch: [u8; 10],
    buf: BytesMut,
}

impl WireBuffer {
    pub fn with_capacity(size: usize) -> Self {
        Self::wrap(BytesMut::with_capacity(size))
    }

    /// Continues writing at the end of `buf`.
    pub fn wrap(buf: BytesMut) -> Self {
        WireBuffer {
            scratch: [0; 10],
            buf,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    /// Writes a top-level message body, without key or length.
    #[inline]
    pub fn write<M: Message>(&mut self, msg: &M) {
        msg.emit(self);
    }

    #[inline]
    fn key(&mut self, field: u32, wire_type: u8) {
        self.uvarint(((field as u64) << 3) | wire_type as u64);
    }

    /// Writes a variable-length unsigned integer.
    #[inline]
    fn uvarint(&mut self, mut u: u64) {
        let mut i = 0;
        while u >= 0x80 {
            self.scratch[i] = (u as u8) | 0x80;
            u >>= 7;
            i += 1;
        }
        self.scratch[i] = u as u8;
        i += 1;
        self.buf.extend_from_slice(&self.scratch[..i]);
    }
}

impl Sink for WireBuffer {
    #[inline]
    fn varint(&mut self, field: u32, value: u64) {
        self.key(field, WIRETYPE_VARINT);
        self.uvarint(value);
    }

    #[inline]
    fn fixed64(&mut self, field: u32, value: u64) {
        self.key(field, WIRETYPE_FIXED64);
        self.buf.put_u64_le(value);
    }

    #[inline]
    fn bytes(&mut self, field: u32, value: &[u8]) {
        self.key(field, WIRETYPE_LENGTH_DELIMITED);
        self.uvarint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    fn message<M: Message>(&mut self, field: u32, msg: &M) {
        self.key(field, WIRETYPE_LENGTH_DELIMITED);
        self.uvarint(msg.size_in_bytes() as u64);
        msg.emit(self);
    }
}

/// Number of bytes `value` takes as a varint.
pub(crate) fn varint_size(value: u64) -> usize {
    // One byte per started 7-bit group; zero still takes a byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

fn key_size(field: u32) -> usize {
    varint_size((field as u64) << 3)
}
