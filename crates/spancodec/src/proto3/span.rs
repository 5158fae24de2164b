//! Message shapes of the zipkin proto3 model: `ListOfSpans`, `Span`,
//! `Endpoint`, `Annotation` and the tag map entry.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::proto3::sink::{Message, Sink};
use crate::reader::{
    be_u64, ReadBuffer, WIRETYPE_FIXED64, WIRETYPE_LENGTH_DELIMITED, WIRETYPE_VARINT,
};
use crate::types::{Annotation, Endpoint, Kind, Span, TraceId};

// ListOfSpans field numbers.
const LIST_SPANS: u32 = 1;

// Span field numbers.
const TRACE_ID: u32 = 1;
const PARENT_ID: u32 = 2;
const ID: u32 = 3;
const KIND: u32 = 4;
const NAME: u32 = 5;
const TIMESTAMP: u32 = 6;
const DURATION: u32 = 7;
const LOCAL_ENDPOINT: u32 = 8;
const REMOTE_ENDPOINT: u32 = 9;
const ANNOTATIONS: u32 = 10;
const TAGS: u32 = 11;
const DEBUG: u32 = 12;
const SHARED: u32 = 13;

// Endpoint field numbers.
const SERVICE_NAME: u32 = 1;
const IPV4: u32 = 2;
const IPV6: u32 = 3;
const PORT: u32 = 4;

// Annotation field numbers.
const ANNOTATION_TIMESTAMP: u32 = 1;
const ANNOTATION_VALUE: u32 = 2;

// Tag map entry field numbers.
const TAG_KEY: u32 = 1;
const TAG_VALUE: u32 = 2;

// === Writing ===

/// One span framed as an element of `ListOfSpans`.
///
/// A single encoded span and a list of spans share this framing, so any
/// proto3 payload can be read as a list.
pub(crate) struct ListEntry<'a>(pub &'a Span);

impl Message for ListEntry<'_> {
    fn emit<S: Sink>(&self, out: &mut S) {
        out.message(LIST_SPANS, self.0);
    }
}

impl Message for Span {
    fn emit<S: Sink>(&self, out: &mut S) {
        let trace_id = trace_id_bytes(&self.trace_id());
        out.bytes(TRACE_ID, &trace_id[16 - self.trace_id().byte_len()..]);
        if let Some(parent_id) = self.parent_id() {
            out.bytes(PARENT_ID, &parent_id.to_be_bytes());
        }
        out.bytes(ID, &self.id().to_be_bytes());
        if let Some(kind) = self.kind() {
            out.varint(KIND, kind as u64);
        }
        if let Some(name) = self.name().filter(|n| !n.is_empty()) {
            out.string(NAME, name);
        }
        if let Some(ts) = self.timestamp().filter(|&ts| ts != 0) {
            out.fixed64(TIMESTAMP, ts);
        }
        if let Some(duration) = self.duration().filter(|&d| d != 0) {
            out.varint(DURATION, duration);
        }
        if let Some(ep) = self.local_endpoint().filter(|ep| !ep.is_empty()) {
            out.message(LOCAL_ENDPOINT, ep);
        }
        if let Some(ep) = self.remote_endpoint().filter(|ep| !ep.is_empty()) {
            out.message(REMOTE_ENDPOINT, ep);
        }
        for annotation in self.annotations() {
            out.message(ANNOTATIONS, annotation);
        }
        for (key, value) in self.tags() {
            out.message(TAGS, &TagEntry(key, value));
        }
        if self.debug() {
            out.varint(DEBUG, 1);
        }
        if self.shared() {
            out.varint(SHARED, 1);
        }
    }
}

impl Message for Endpoint {
    fn emit<S: Sink>(&self, out: &mut S) {
        if let Some(name) = self.service_name().filter(|n| !n.is_empty()) {
            out.string(SERVICE_NAME, name);
        }
        if let Some(ip) = self.ipv4() {
            out.bytes(IPV4, &ip.octets());
        }
        if let Some(ip) = self.ipv6() {
            out.bytes(IPV6, &ip.octets());
        }
        if let Some(port) = self.port().filter(|&p| p != 0) {
            out.varint(PORT, port as u64);
        }
    }
}

impl Message for Annotation {
    fn emit<S: Sink>(&self, out: &mut S) {
        if self.timestamp != 0 {
            out.fixed64(ANNOTATION_TIMESTAMP, self.timestamp);
        }
        if !self.value.is_empty() {
            out.string(ANNOTATION_VALUE, &self.value);
        }
    }
}

struct TagEntry<'a>(&'a str, &'a str);

impl Message for TagEntry<'_> {
    fn emit<S: Sink>(&self, out: &mut S) {
        if !self.0.is_empty() {
            out.string(TAG_KEY, self.0);
        }
        if !self.1.is_empty() {
            out.string(TAG_VALUE, self.1);
        }
    }
}

/// High then low half, big-endian. A 64-bit ID uses the trailing 8 bytes.
fn trace_id_bytes(trace_id: &TraceId) -> [u8; 16] {
    let mut b = [0u8; 16];
    b[..8].copy_from_slice(&trace_id.high.to_be_bytes());
    b[8..].copy_from_slice(&trace_id.low.to_be_bytes());
    b
}

// === Reading ===

/// Reads one `ListOfSpans` element. The leading key is not validated.
pub(crate) fn read_list_entry(buf: &mut ReadBuffer<'_>) -> Result<Span> {
    buf.uvarint()?;
    let mut msg = buf.length_delimited()?;
    read_span(&mut msg)
}

fn read_span(buf: &mut ReadBuffer<'_>) -> Result<Span> {
    let mut b = Span::builder();
    while !buf.is_empty() {
        let (field, wire_type) = buf.key()?;
        b = match (field, wire_type) {
            (TRACE_ID, WIRETYPE_LENGTH_DELIMITED) => b.trace_id(read_trace_id(buf)?),
            (PARENT_ID, WIRETYPE_LENGTH_DELIMITED) => b.parent_id(read_id(buf, "parentId")?),
            (ID, WIRETYPE_LENGTH_DELIMITED) => b.id(read_id(buf, "id")?),
            (KIND, WIRETYPE_VARINT) => b.kind(Kind::from_proto(buf.uvarint()?)),
            (NAME, WIRETYPE_LENGTH_DELIMITED) => b.name(buf.string()?),
            (TIMESTAMP, WIRETYPE_FIXED64) => b.timestamp(buf.fixed64()?),
            (DURATION, WIRETYPE_VARINT) => b.duration(buf.uvarint()?),
            (LOCAL_ENDPOINT, WIRETYPE_LENGTH_DELIMITED) => {
                b.local_endpoint(read_endpoint(&mut buf.length_delimited()?)?)
            }
            (REMOTE_ENDPOINT, WIRETYPE_LENGTH_DELIMITED) => {
                b.remote_endpoint(read_endpoint(&mut buf.length_delimited()?)?)
            }
            (ANNOTATIONS, WIRETYPE_LENGTH_DELIMITED) => {
                let a = read_annotation(&mut buf.length_delimited()?)?;
                b.add_annotation(a.timestamp, a.value)
            }
            (TAGS, WIRETYPE_LENGTH_DELIMITED) => {
                let (key, value) = read_tag(&mut buf.length_delimited()?)?;
                b.put_tag(key, value)
            }
            (DEBUG, WIRETYPE_VARINT) => b.debug(buf.uvarint()? != 0),
            (SHARED, WIRETYPE_VARINT) => b.shared(buf.uvarint()? != 0),
            (f, wire_type) => {
                log::trace!("skipping span field {f} with wire type {wire_type}");
                buf.skip(wire_type)?;
                b
            }
        };
    }
    b.build()
}

fn read_trace_id(buf: &mut ReadBuffer<'_>) -> Result<TraceId> {
    let len = buf.length()?;
    let bytes = buf.bytes(len)?;
    match len {
        8 => Ok(TraceId::from(be_u64(bytes))),
        16 => Ok(TraceId::new(be_u64(&bytes[..8]), be_u64(&bytes[8..]))),
        other => Err(Error::malformed(format!("traceId length {other} is not 8 or 16"))),
    }
}

fn read_id(buf: &mut ReadBuffer<'_>, field: &str) -> Result<u64> {
    let len = buf.length()?;
    let bytes = buf.bytes(len)?;
    if len != 8 {
        return Err(Error::malformed(format!("{field} length {len} is not 8")));
    }
    Ok(be_u64(bytes))
}

/// Reads an endpoint message. Returns `None` when no field is set.
pub(crate) fn read_endpoint(buf: &mut ReadBuffer<'_>) -> Result<Option<Endpoint>> {
    let mut b = Endpoint::builder();
    while !buf.is_empty() {
        let (field, wire_type) = buf.key()?;
        b = match (field, wire_type) {
            (SERVICE_NAME, WIRETYPE_LENGTH_DELIMITED) => {
                b.service_name(buf.string()?)
            }
            (IPV4, WIRETYPE_LENGTH_DELIMITED) => {
                let len = buf.length()?;
                match <[u8; 4]>::try_from(buf.bytes(len)?) {
                    Ok(octets) => b.ipv4(Ipv4Addr::from(octets)),
                    Err(_) => b,
                }
            }
            (IPV6, WIRETYPE_LENGTH_DELIMITED) => {
                let len = buf.length()?;
                match <[u8; 16]>::try_from(buf.bytes(len)?) {
                    Ok(octets) => b.ipv6(Ipv6Addr::from(octets)),
                    Err(_) => b,
                }
            }
            (PORT, WIRETYPE_VARINT) => match u16::try_from(buf.uvarint()?) {
                Ok(port) => b.port(port),
                Err(_) => b,
            },
            (f, wire_type) => {
                log::trace!("skipping endpoint field {f} with wire type {wire_type}");
                buf.skip(wire_type)?;
                b
            }
        };
    }
    let endpoint = b.build();
    Ok(if endpoint.is_empty() {
        None
    } else {
        Some(endpoint)
    })
}

fn read_annotation(buf: &mut ReadBuffer<'_>) -> Result<Annotation> {
    let mut annotation = Annotation::new(0, "");
    while !buf.is_empty() {
        match buf.key()? {
            (ANNOTATION_TIMESTAMP, WIRETYPE_FIXED64) => {
                annotation.timestamp = buf.fixed64()?
            }
            (ANNOTATION_VALUE, WIRETYPE_LENGTH_DELIMITED) => {
                annotation.value = buf.string()?
            }
            (_, wire_type) => buf.skip(wire_type)?,
        }
    }
    Ok(annotation)
}

fn read_tag(buf: &mut ReadBuffer<'_>) -> Result<(String, String)> {
    let (mut key, mut value) = (String::new(), String::new());
    while !buf.is_empty() {
        match buf.key()? {
            (TAG_KEY, WIRETYPE_LENGTH_DELIMITED) => key = buf.string()?,
            (TAG_VALUE, WIRETYPE_LENGTH_DELIMITED) => value = buf.string()?,
            (_, wire_type) => buf.skip(wire_type)?,
        }
    }
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto3::sink::WireBuffer;

    fn encode<M: Message>(msg: &M) -> Vec<u8> {
        let mut buf = WireBuffer::with_capacity(msg.size_in_bytes());
        buf.write(msg);
        buf.into_inner().to_vec()
    }

    fn minimal_span() -> Span {
        Span::builder()
            .trace_id(0x6b221d5bc9e6496c)
            .id(0x5b4185666d50f68b)
            .build()
            .unwrap()
    }

    #[test]
    fn test_minimal_span_bytes() {
        let bytes = encode(&ListEntry(&minimal_span()));
        assert_eq!(
            bytes,
            vec![
                0x0a, 0x14, // ListOfSpans.spans, length 20
                0x0a, 0x08, 0x6b, 0x22, 0x1d, 0x5b, 0xc9, 0xe6, 0x49, 0x6c, // traceId
                0x1a, 0x08, 0x5b, 0x41, 0x85, 0x66, 0x6d, 0x50, 0xf6, 0x8b, // id
            ]
        );
    }

    #[test]
    fn test_128bit_trace_id_bytes() {
        let span = minimal_span()
            .to_builder()
            .trace_id(TraceId::new(0x48485a3953bb6124, 0x6b221d5bc9e6496c))
            .build()
            .unwrap();
        let bytes = encode(&span);
        assert_eq!(&bytes[..2], &[0x0a, 0x10]);
        assert_eq!(&bytes[2..10], &0x48485a3953bb6124u64.to_be_bytes());
        assert_eq!(&bytes[10..18], &0x6b221d5bc9e6496cu64.to_be_bytes());
    }

    #[test]
    fn test_read_list_entry() {
        let span = minimal_span()
            .to_builder()
            .kind(Kind::Server)
            .shared(true)
            .put_tag("http.path", "/api")
            .add_annotation(1472470996199000, "foo")
            .build()
            .unwrap();
        let bytes = encode(&ListEntry(&span));
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(read_list_entry(&mut buf).unwrap(), span);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_skips_unknown_fields() {
        let mut bytes = encode(&minimal_span());
        // field 99, varint
        bytes.extend_from_slice(&[0x98, 0x06, 0x01]);
        // field 100, fixed32
        bytes.extend_from_slice(&[0xa5, 0x06, 1, 2, 3, 4]);
        // kind (field 4) with an unexpected wire type: length-delimited
        bytes.extend_from_slice(&[0x22, 0x01, 0x00]);
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(read_span(&mut buf).unwrap(), minimal_span());
    }

    #[test]
    fn test_invalid_wire_type() {
        let mut bytes = encode(&minimal_span());
        bytes.push(0x0b); // field 1, wire type 3 (start group)
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(
            read_span(&mut buf),
            Err(Error::malformed("invalid wire type 3"))
        );
    }

    #[test]
    fn test_missing_id() {
        let bytes = [0x0a, 0x08, 0, 0, 0, 0, 0, 0, 0, 1];
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(read_span(&mut buf), Err(Error::invalid("Missing: id")));
    }

    #[test]
    fn test_bad_trace_id_length() {
        let bytes = [0x0a, 0x02, 0, 1];
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(
            read_span(&mut buf),
            Err(Error::malformed("traceId length 2 is not 8 or 16"))
        );
    }

    #[test]
    fn test_empty_endpoint_collapses() {
        let mut buf = ReadBuffer::wrap(&[]);
        assert_eq!(read_endpoint(&mut buf).unwrap(), None);

        // Only an unknown field and a zero port.
        let mut buf = ReadBuffer::wrap(&[0x28, 0x01, 0x20, 0x00]);
        assert_eq!(read_endpoint(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_nested_empty_endpoint_collapses() {
        let mut bytes = encode(&minimal_span());
        bytes.extend_from_slice(&[0x42, 0x00]); // localEndpoint, length 0
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(read_span(&mut buf).unwrap().local_endpoint(), None);
    }

    #[test]
    fn test_endpoint_round_trip() {
        let ep = Endpoint::builder()
            .service_name("backend")
            .ip("192.168.99.101")
            .ip("2001:db8::c001")
            .port(9000)
            .build();
        let bytes = encode(&ep);
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(read_endpoint(&mut buf).unwrap(), Some(ep));
    }

    #[test]
    fn test_endpoint_ignores_bad_address_length() {
        let mut buf = ReadBuffer::wrap(&[0x12, 0x03, 1, 2, 3, 0x20, 0x50]);
        let ep = read_endpoint(&mut buf).unwrap().unwrap();
        assert_eq!(ep.ipv4(), None);
        assert_eq!(ep.port(), Some(0x50));
    }

    #[test]
    fn test_endpoint_ignores_out_of_range_port() {
        // serviceName "web", then port 65537.
        let mut buf = ReadBuffer::wrap(&[0x0a, 0x03, b'w', b'e', b'b', 0x20, 0x81, 0x80, 0x04]);
        let ep = read_endpoint(&mut buf).unwrap().unwrap();
        assert_eq!(ep.service_name(), Some("web"));
        assert_eq!(ep.port(), None);
    }
}
