//! The format constants callers select codecs by.
//!
//! Each constant is stateless and `Copy`; one value may be shared by any
//! number of threads. Names parse case-insensitively, so a codec can be
//! picked from a config file:
//!
//! ```
//! use encore_spancodec::SpanBytesDecoder;
//!
//! #[derive(serde::Deserialize)]
//! struct Config {
//!     decoder: SpanBytesDecoder,
//! }
//!
//! let cfg: Config = serde_json::from_str(r#"{"decoder": "PROTO3"}"#).unwrap();
//! assert_eq!(cfg.decoder, SpanBytesDecoder::Proto3);
//! ```

use std::fmt;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, UnknownEncoding};
use crate::json::{self, Shape};
use crate::proto3;
use crate::reader::ReadBuffer;
use crate::types::Span;

const SPAN: &str = "Span";
const SPAN_LIST: &str = "List<Span>";

/// The byte-level family of an encoder or decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Encoding {
    Json,
    Proto3,
}

impl Encoding {
    /// The configuration name: `JSON` or `PROTO3`.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Json => "JSON",
            Encoding::Proto3 => "PROTO3",
        }
    }

    /// Size of a list whose encoded elements have the given sizes.
    pub fn list_size_in_bytes(&self, sizes: impl IntoIterator<Item = usize>) -> usize {
        match self {
            Encoding::Proto3 => sizes.into_iter().sum(),
            Encoding::Json => {
                let (count, sum) = sizes
                    .into_iter()
                    .fold((0usize, 0usize), |(count, sum), size| (count + 1, sum + size));
                // Brackets, plus a comma between elements.
                2 + sum + count.saturating_sub(1)
            }
        }
    }
}

/// Lower-case, as it appears in decode errors.
impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Json => f.write_str("json"),
            Encoding::Proto3 => f.write_str("proto3"),
        }
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Encoding::Json, Encoding::Proto3]
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

/// Writes spans. There is no v1 JSON writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SpanBytesEncoder {
    JsonV2,
    Proto3,
}

impl SpanBytesEncoder {
    pub fn name(&self) -> &'static str {
        match self {
            SpanBytesEncoder::JsonV2 => "JSON_V2",
            SpanBytesEncoder::Proto3 => "PROTO3",
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            SpanBytesEncoder::JsonV2 => Encoding::Json,
            SpanBytesEncoder::Proto3 => Encoding::Proto3,
        }
    }

    /// Exact number of bytes [`encode`](Self::encode) produces for `span`.
    pub fn size_in_bytes(&self, span: &Span) -> usize {
        match self {
            SpanBytesEncoder::JsonV2 => json::size_in_bytes(span),
            SpanBytesEncoder::Proto3 => proto3::size_in_bytes(span),
        }
    }

    pub fn encode(&self, span: &Span) -> Bytes {
        match self {
            SpanBytesEncoder::JsonV2 => json::encode(span),
            SpanBytesEncoder::Proto3 => proto3::encode(span),
        }
    }

    pub fn encode_list(&self, spans: &[Span]) -> Bytes {
        let mut out = BytesMut::new();
        self.encode_list_into(spans, &mut out);
        out.freeze()
    }

    /// Appends the encoded list to `out`.
    pub fn encode_list_into(&self, spans: &[Span], out: &mut BytesMut) {
        match self {
            SpanBytesEncoder::JsonV2 => json::encode_list_into(spans, out),
            SpanBytesEncoder::Proto3 => proto3::encode_list_into(spans, out),
        }
    }
}

impl fmt::Display for SpanBytesEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpanBytesEncoder {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [SpanBytesEncoder::JsonV2, SpanBytesEncoder::Proto3]
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

/// Reads spans.
///
/// Input may be any byte slice or a [`ReadBuffer`] window over a larger
/// array; only the window's bytes are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SpanBytesDecoder {
    /// The legacy v1 shape. Decode only.
    JsonV1,
    JsonV2,
    Proto3,
}

impl SpanBytesDecoder {
    pub fn name(&self) -> &'static str {
        match self {
            SpanBytesDecoder::JsonV1 => "JSON_V1",
            SpanBytesDecoder::JsonV2 => "JSON_V2",
            SpanBytesDecoder::Proto3 => "PROTO3",
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            SpanBytesDecoder::JsonV1 | SpanBytesDecoder::JsonV2 => Encoding::Json,
            SpanBytesDecoder::Proto3 => Encoding::Proto3,
        }
    }

    /// Decodes the first span of the input. Empty input is an error.
    pub fn decode_one<'a>(&self, input: impl Into<ReadBuffer<'a>>) -> Result<Span, DecodeError> {
        let mut buf: ReadBuffer<'a> = input.into();
        let result = match self {
            SpanBytesDecoder::JsonV1 => json::decode_one(Shape::V1, buf.remaining()),
            SpanBytesDecoder::JsonV2 => json::decode_one(Shape::V2, buf.remaining()),
            SpanBytesDecoder::Proto3 => proto3::decode_one(&mut buf),
        };
        result.map_err(|err| self.fail(err.reading(SPAN, self.encoding())))
    }

    /// Decodes a list of spans. Empty input, and for JSON `[]`, decode to an
    /// empty list.
    pub fn decode_list<'a>(
        &self,
        input: impl Into<ReadBuffer<'a>>,
    ) -> Result<Vec<Span>, DecodeError> {
        let mut out = Vec::new();
        self.decode_list_into(input, &mut out)?;
        Ok(out)
    }

    /// Appends decoded spans to `out`, never clearing it first.
    ///
    /// Returns false, leaving `out` untouched, only for empty input. On error,
    /// spans decoded before the failure may already have been appended.
    pub fn decode_list_into<'a>(
        &self,
        input: impl Into<ReadBuffer<'a>>,
        out: &mut impl Extend<Span>,
    ) -> Result<bool, DecodeError> {
        let mut buf: ReadBuffer<'a> = input.into();
        if buf.is_empty() {
            return Ok(false);
        }
        let result = match self {
            SpanBytesDecoder::JsonV1 => json::decode_list_into(Shape::V1, buf.remaining(), out),
            SpanBytesDecoder::JsonV2 => json::decode_list_into(Shape::V2, buf.remaining(), out),
            SpanBytesDecoder::Proto3 => proto3::decode_list_into(&mut buf, out),
        };
        result
            .map(|()| true)
            .map_err(|err| self.fail(err.reading(SPAN_LIST, self.encoding())))
    }

    fn fail(&self, err: DecodeError) -> DecodeError {
        log::debug!("{self} decode failed: {err}");
        err
    }
}

impl fmt::Display for SpanBytesDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpanBytesDecoder {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SpanBytesDecoder::JsonV1,
            SpanBytesDecoder::JsonV2,
            SpanBytesDecoder::Proto3,
        ]
        .into_iter()
        .find(|d| d.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

macro_rules! serde_by_name {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = UnknownEncoding;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for &'static str {
            fn from(v: $ty) -> Self {
                v.name()
            }
        }
    )*};
}

serde_by_name!(Encoding, SpanBytesEncoder, SpanBytesDecoder);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn span() -> Span {
        Span::builder()
            .trace_id(0x7180c278b62e8f6a)
            .id(0x5b4185666d50f68b)
            .name("get")
            .build()
            .unwrap()
    }

    #[test]
    fn test_names() {
        assert_eq!("proto3".parse::<SpanBytesDecoder>(), Ok(SpanBytesDecoder::Proto3));
        assert_eq!("Json_V1".parse::<SpanBytesDecoder>(), Ok(SpanBytesDecoder::JsonV1));
        assert_eq!("JSON_V2".parse::<SpanBytesEncoder>(), Ok(SpanBytesEncoder::JsonV2));
        assert_eq!(
            "JSON_V1".parse::<SpanBytesEncoder>(),
            Err(UnknownEncoding("JSON_V1".into()))
        );
        assert_eq!("json".parse::<Encoding>(), Ok(Encoding::Json));
        assert_eq!(SpanBytesDecoder::JsonV1.to_string(), "JSON_V1");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&SpanBytesEncoder::Proto3).unwrap(),
            r#""PROTO3""#
        );
        assert_eq!(
            serde_json::from_str::<Encoding>(r#""proto3""#).unwrap(),
            Encoding::Proto3
        );
        let err = serde_json::from_str::<SpanBytesDecoder>(r#""THRIFT""#).unwrap_err();
        assert!(err.to_string().contains("unknown encoding \"THRIFT\""));
    }

    #[test]
    fn test_list_size_in_bytes() {
        assert_eq!(Encoding::Json.list_size_in_bytes([0usize; 0]), 2);
        assert_eq!(Encoding::Json.list_size_in_bytes([10]), 12);
        assert_eq!(Encoding::Json.list_size_in_bytes([10, 20, 30]), 64);
        assert_eq!(Encoding::Proto3.list_size_in_bytes([10, 20, 30]), 60);

        let spans = vec![span(), span(), span()];
        for encoder in [SpanBytesEncoder::JsonV2, SpanBytesEncoder::Proto3] {
            let sizes = spans.iter().map(|s| encoder.size_in_bytes(s));
            assert_eq!(
                encoder.encoding().list_size_in_bytes(sizes),
                encoder.encode_list(&spans).len()
            );
        }
    }

    #[test]
    fn test_decode_list_into_false_on_empty() {
        let mut out = vec![span()];
        for decoder in [
            SpanBytesDecoder::JsonV1,
            SpanBytesDecoder::JsonV2,
            SpanBytesDecoder::Proto3,
        ] {
            assert_eq!(decoder.decode_list_into(&[0u8; 0], &mut out), Ok(false));
        }
        assert_eq!(out, vec![span()]);
    }

    #[test]
    fn test_decode_one_empty_is_error() {
        for decoder in [SpanBytesDecoder::JsonV2, SpanBytesDecoder::Proto3] {
            let err = decoder.decode_one(&[0u8; 0]).unwrap_err();
            assert_matches!(err.kind(), Error::Malformed(_));
            assert_eq!(err.target, "Span");
        }
    }

    #[test]
    fn test_decode_one_v1() {
        let span = SpanBytesDecoder::JsonV1
            .decode_one(br#"{"traceId": "1", "id": "2", "name": "get"}"#)
            .unwrap();
        assert_eq!(span.name(), Some("get"));
    }
}
