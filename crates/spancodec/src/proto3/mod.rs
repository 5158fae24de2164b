//! The zipkin proto3 wire encoding, written and read without a protobuf runtime.
//!
//! A payload is a sequence of `ListOfSpans.spans` entries: each span is
//! written as key `0x0a`, a varint length and the `Span` message. A single
//! encoded span is a one-element list.

mod sink;
mod span;

use bytes::{Bytes, BytesMut};

use crate::codec::Encoding;
use crate::error::{DecodeError, Result};
use crate::reader::ReadBuffer;
use crate::types::{Endpoint, Span};

use self::sink::{Message, WireBuffer};
use self::span::ListEntry;

/// Exact number of bytes [`encode`] writes for `span`.
pub fn size_in_bytes(span: &Span) -> usize {
    ListEntry(span).size_in_bytes()
}

/// Encodes a span as a one-element list.
pub fn encode(span: &Span) -> Bytes {
    let entry = ListEntry(span);
    let mut buf = WireBuffer::with_capacity(entry.size_in_bytes());
    buf.write(&entry);
    buf.into_inner().freeze()
}

/// Appends each span to `out`, with no framing beyond the list entries.
pub fn encode_list_into(spans: &[Span], out: &mut BytesMut) {
    let size: usize = spans.iter().map(size_in_bytes).sum();
    out.reserve(size);
    let mut buf = WireBuffer::wrap(std::mem::take(out));
    for span in spans {
        buf.write(&ListEntry(span));
    }
    *out = buf.into_inner();
}

pub fn encode_list(spans: &[Span]) -> Bytes {
    let mut out = BytesMut::new();
    encode_list_into(spans, &mut out);
    out.freeze()
}

/// Decodes the first span of a payload.
pub(crate) fn decode_one(buf: &mut ReadBuffer<'_>) -> Result<Span> {
    span::read_list_entry(buf)
}

/// Decodes every span of a payload, appending to `out`.
pub(crate) fn decode_list_into(
    buf: &mut ReadBuffer<'_>,
    out: &mut impl Extend<Span>,
) -> Result<()> {
    while !buf.is_empty() {
        let span = span::read_list_entry(buf)?;
        out.extend(std::iter::once(span));
    }
    Ok(())
}

/// Decodes a standalone `Endpoint` message. An endpoint with no field set
/// decodes to `None`.
pub fn decode_endpoint<'a>(
    input: impl Into<ReadBuffer<'a>>,
) -> std::result::Result<Option<Endpoint>, DecodeError> {
    span::read_endpoint(&mut input.into())
        .map_err(|err| err.reading("Endpoint", Encoding::Proto3))
}
