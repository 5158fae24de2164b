#![allow(dead_code)]

use encore_spancodec::{Endpoint, Kind, Span, TraceId};

pub const TODAY: u64 = 1472470996199000;

pub fn frontend() -> Endpoint {
    Endpoint::builder()
        .service_name("frontend")
        .ip("127.0.0.1")
        .build()
}

pub fn backend() -> Endpoint {
    Endpoint::builder()
        .service_name("backend")
        .ip("192.168.99.101")
        .port(9000)
        .build()
}

/// A client span with every field set and a 128-bit trace ID.
pub fn client_span() -> Span {
    Span::builder()
        .trace_id(TraceId::new(0x7180c278b62e8f6a, 0x216a2aea45d08fc9))
        .parent_id(0x6b221d5bc9e6496c)
        .id(0x5b4185666d50f68b)
        .kind(Kind::Client)
        .name("get")
        .timestamp(TODAY + 50)
        .duration(200)
        .local_endpoint(frontend())
        .remote_endpoint(backend())
        .add_annotation(TODAY + 100, "foo")
        .put_tag("http.path", "/api")
        .put_tag("clnt/finagle.version", "6.45.0")
        .build()
        .unwrap()
}

/// Only the mandatory fields.
pub fn minimal_span() -> Span {
    Span::builder()
        .trace_id(0x6b221d5bc9e6496c)
        .id(0x5b4185666d50f68b)
        .build()
        .unwrap()
}

/// The server side of `client_span`, reported under the same ID.
pub fn shared_server_span() -> Span {
    client_span()
        .to_builder()
        .kind(Kind::Server)
        .shared(true)
        .local_endpoint(backend())
        .remote_endpoint(frontend())
        .build()
        .unwrap()
}

pub fn utf8_span() -> Span {
    minimal_span()
        .to_builder()
        .name("Γειά σου Κόσμε")
        .add_annotation(TODAY, "\u{1F600} \"quoted\"\n\ttabbed")
        .put_tag("emoji", "\u{1F4A9}")
        .build()
        .unwrap()
}
