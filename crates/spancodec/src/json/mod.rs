//! Zipkin JSON: the v2 span shape for writing and reading, and the legacy
//! v1 shape for reading only.

mod reader;
mod v1;
mod writer;

use std::borrow::Cow;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use serde_path_to_error::{Path, Segment};

use crate::codec::Encoding;
use crate::error::{DecodeError, Error, Result};
use crate::types::{Endpoint, Span};

use self::reader::{RawEndpoint, RawSpan};
use self::v1::V1Span;
use self::writer::{JsonV2, JsonV2List};

/// Which span shape a JSON payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    V1,
    V2,
}

/// Exact number of bytes [`encode`] writes for `span`.
pub(crate) fn size_in_bytes(span: &Span) -> usize {
    let mut counter = ByteCounter(0);
    serialize(&mut counter, &JsonV2(span));
    counter.0
}

pub(crate) fn encode(span: &Span) -> Bytes {
    let mut out = BytesMut::with_capacity(size_in_bytes(span));
    serialize((&mut out).writer(), &JsonV2(span));
    out.freeze()
}

/// Appends a JSON array of `spans` to `out`.
pub(crate) fn encode_list_into(spans: &[Span], out: &mut BytesMut) {
    serialize(out.writer(), &JsonV2List(spans));
}

pub(crate) fn decode_one(shape: Shape, data: &[u8]) -> Result<Span> {
    match shape {
        Shape::V2 => parse::<RawSpan>(data)?.into_span(),
        Shape::V1 => parse::<V1Span>(data)?
            .into_spans()?
            .into_iter()
            .next()
            .ok_or(Error::Malformed(None)),
    }
}

/// Decodes a JSON array of spans, appending to `out`.
pub(crate) fn decode_list_into(
    shape: Shape,
    data: &[u8],
    out: &mut impl Extend<Span>,
) -> Result<()> {
    match shape {
        Shape::V2 => {
            for raw in parse::<Vec<RawSpan>>(data)? {
                out.extend(std::iter::once(raw.into_span()?));
            }
        }
        Shape::V1 => {
            for raw in parse::<Vec<V1Span>>(data)? {
                out.extend(raw.into_spans()?);
            }
        }
    }
    Ok(())
}

/// Decodes a standalone endpoint object. An object with no usable field
/// decodes to `None`.
pub fn decode_endpoint(data: &[u8]) -> std::result::Result<Option<Endpoint>, DecodeError> {
    parse::<RawEndpoint>(data)
        .map(RawEndpoint::into_endpoint)
        .map_err(|err| err.reading("Endpoint", Encoding::Json))
}

/// Parses leniently: a bare `NULL` reads as `null`. Type errors name the
/// offending field as a `$` path.
fn parse<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let data = lower_null_literals(data);
    let mut de = serde_json::Deserializer::from_slice(&data);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = json_path(err.path());
        from_serde(err.into_inner(), &path)
    })?;
    de.end().map_err(|err| from_serde(err, "$"))?;
    Ok(value)
}

/// Rewrites `NULL` outside of strings to `null`.
fn lower_null_literals(data: &[u8]) -> Cow<'_, [u8]> {
    let mut owned: Option<Vec<u8>> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if data[i..].starts_with(b"NULL") {
            owned.get_or_insert_with(|| data.to_vec())[i..i + 4].copy_from_slice(b"null");
            i += 4;
            continue;
        }
        i += 1;
    }
    match owned {
        Some(data) => Cow::Owned(data),
        None => Cow::Borrowed(data),
    }
}

/// Renders as `$.annotations[0].value`, or `$[1].id` inside a list.
fn json_path(path: &Path) -> String {
    let mut out = String::from("$");
    for segment in path.iter() {
        if !matches!(segment, Segment::Seq { .. }) {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

fn from_serde(err: serde_json::Error, path: &str) -> Error {
    match err.classify() {
        Category::Data => {
            let msg = err.to_string();
            let position = format!(" at line {} column {}", err.line(), err.column());
            let msg = msg.strip_suffix(&position).unwrap_or(&msg);
            Error::invalid(format!("{msg} at {path}"))
        }
        Category::Syntax | Category::Eof | Category::Io => {
            log::debug!("malformed json: {err}");
            Error::Malformed(None)
        }
    }
}

fn serialize<W: io::Write, T: serde::Serialize>(writer: W, value: &T) {
    // Span serializers only emit string keys and the writers never fail.
    serde_json::to_writer(writer, value).expect("span serializes to json");
}

/// An `io::Write` that only counts.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
