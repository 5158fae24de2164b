//! Zipkin span codec: JSON (v2, plus v1 for reading) and proto3.
//!
//! Both formats read and write the same [`Span`] model. The proto3 wire
//! format is implemented directly, without a protobuf runtime.
//!
//! # Proto3 layout
//!
//! A payload is a sequence of `ListOfSpans.spans` entries:
//!
//! | Bytes  | Field                                  |
//! |--------|----------------------------------------|
//! | 1      | Key `0x0a` (field 1, length-delimited) |
//! | 1..10  | Varint length of the span message      |
//! | N      | `Span` message                         |
//!
//! A single encoded span is a one-element list.
//!
//! # Usage
//!
//! ```
//! use encore_spancodec::{Endpoint, Kind, Span, SpanBytesDecoder, SpanBytesEncoder};
//!
//! let span = Span::builder()
//!     .trace_id(0x7180c278b62e8f6a)
//!     .id(0x5b4185666d50f68b)
//!     .kind(Kind::Client)
//!     .name("get")
//!     .local_endpoint(Endpoint::builder().service_name("frontend").build())
//!     .build()
//!     .unwrap();
//!
//! let bytes = SpanBytesEncoder::Proto3.encode_list(&[span.clone()]);
//! let decoded = SpanBytesDecoder::Proto3.decode_list(&bytes).unwrap();
//! assert_eq!(decoded, vec![span]);
//!
//! match SpanBytesDecoder::JsonV2.decode_list(b"hello") {
//!     Ok(spans) => println!("{} spans", spans.len()),
//!     Err(e) => eprintln!("{e}"), // Malformed reading List<Span> from json
//! }
//! ```

pub mod codec;
pub mod error;
pub mod hex;
pub mod json;
pub mod proto3;
mod reader;
pub mod types;

pub use codec::{Encoding, SpanBytesDecoder, SpanBytesEncoder};
pub use error::{DecodeError, Error, UnknownEncoding};
pub use reader::ReadBuffer;
pub use types::{Annotation, Endpoint, EndpointBuilder, Kind, Span, SpanBuilder, TraceId};
