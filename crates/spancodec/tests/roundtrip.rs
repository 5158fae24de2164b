mod common;

use encore_spancodec::{Endpoint, Kind, Span, SpanBytesDecoder, SpanBytesEncoder, TraceId};
use proptest::prelude::*;

use common::*;

const FORMATS: [(SpanBytesEncoder, SpanBytesDecoder); 2] = [
    (SpanBytesEncoder::JsonV2, SpanBytesDecoder::JsonV2),
    (SpanBytesEncoder::Proto3, SpanBytesDecoder::Proto3),
];

fn assert_round_trip(span: Span) {
    for (encoder, decoder) in FORMATS {
        let bytes = encoder.encode(&span);
        assert_eq!(bytes.len(), encoder.size_in_bytes(&span), "{encoder}");
        assert_eq!(decoder.decode_one(&bytes).unwrap(), span, "{encoder}");
    }
    // A single proto3 span is a one-element list.
    let bytes = SpanBytesEncoder::Proto3.encode(&span);
    assert_eq!(SpanBytesDecoder::Proto3.decode_list(&bytes).unwrap(), vec![span]);
}

#[test]
fn test_span_round_trip() {
    assert_round_trip(client_span());
}

#[test]
fn test_minimal_span_round_trip() {
    assert_round_trip(minimal_span());
}

#[test]
fn test_64bit_trace_id_round_trip() {
    let span = client_span()
        .to_builder()
        .trace_id(0x216a2aea45d08fc9)
        .build()
        .unwrap();
    assert_round_trip(span);
}

#[test]
fn test_local_span_round_trip() {
    let span = Span::builder()
        .trace_id(0x7180c278b62e8f6a)
        .id(0x5b4185666d50f68b)
        .name("encode")
        .timestamp(TODAY)
        .duration(3)
        .local_endpoint(frontend())
        .put_tag("lc", "codec")
        .build()
        .unwrap();
    assert_round_trip(span);
}

#[test]
fn test_shared_server_round_trip() {
    assert_round_trip(shared_server_span());
}

#[test]
fn test_utf8_round_trip() {
    assert_round_trip(utf8_span());
}

#[test]
fn test_no_remote_service_name_round_trip() {
    let span = client_span()
        .to_builder()
        .remote_endpoint(Endpoint::builder().ip("192.168.99.101").port(9000).build())
        .build()
        .unwrap();
    assert_eq!(span.remote_service_name(), None);
    assert_round_trip(span);
}

#[test]
fn test_incomplete_duration_round_trip() {
    let span = client_span().to_builder().clear_duration().build().unwrap();
    assert_round_trip(span);
}

#[test]
fn test_list_round_trip() {
    for (encoder, decoder) in FORMATS {
        for count in [0, 1, 10] {
            let spans = vec![client_span(); count];
            let bytes = encoder.encode_list(&spans);
            assert_eq!(decoder.decode_list(&bytes).unwrap(), spans, "{encoder} x{count}");
        }
    }
}

#[test]
fn test_mixed_list_keeps_order() {
    let spans = vec![client_span(), shared_server_span(), minimal_span(), utf8_span()];
    for (encoder, decoder) in FORMATS {
        let bytes = encoder.encode_list(&spans);
        assert_eq!(decoder.decode_list(&bytes).unwrap(), spans, "{encoder}");
    }
}

fn endpoint() -> impl Strategy<Value = Endpoint> {
    (
        proptest::option::of("[a-z][a-z0-9-]{0,15}"),
        proptest::option::of(any::<[u8; 4]>()),
        any::<u16>(),
    )
        .prop_map(|(name, ip, port)| {
            let mut b = Endpoint::builder().port(port);
            if let Some(name) = name {
                b = b.service_name(name);
            }
            if let Some(ip) = ip {
                b = b.ipv4(ip.into());
            }
            b.build()
        })
}

fn span() -> impl Strategy<Value = Span> {
    let ids = (any::<u64>(), any::<u64>(), any::<u64>(), any::<u64>());
    let kind = proptest::option::of(prop_oneof![
        Just(Kind::Client),
        Just(Kind::Server),
        Just(Kind::Producer),
        Just(Kind::Consumer),
    ]);
    let fields = (
        ".{0,20}",
        any::<u64>(),
        any::<u64>(),
        proptest::option::of(endpoint()),
        proptest::option::of(endpoint()),
    );
    let collections = (
        proptest::collection::vec((1..u64::MAX, ".{1,20}"), 0..3),
        proptest::collection::vec(("[a-z.]{1,10}", ".{0,10}"), 0..3),
        any::<bool>(),
        any::<bool>(),
    );
    (ids, kind, fields, collections).prop_map(
        |(
            (high, low, parent_id, id),
            kind,
            (name, timestamp, duration, local, remote),
            (annotations, tags, debug, shared),
        )| {
            let mut b = Span::builder()
                .trace_id(TraceId::new(high, low))
                .parent_id(parent_id)
                .id(id)
                .kind(kind)
                .name(name)
                .timestamp(timestamp)
                .duration(duration)
                .local_endpoint(local)
                .remote_endpoint(remote)
                .debug(debug)
                .shared(shared);
            for (ts, value) in annotations {
                b = b.add_annotation(ts, value);
            }
            for (key, value) in tags {
                b = b.put_tag(key, value);
            }
            b.build().unwrap()
        },
    )
}

proptest! {
    #[test]
    fn test_arbitrary_span_round_trip(span in span()) {
        for (encoder, decoder) in FORMATS {
            let bytes = encoder.encode(&span);
            prop_assert_eq!(bytes.len(), encoder.size_in_bytes(&span));
            prop_assert_eq!(decoder.decode_one(&bytes).unwrap(), span.clone());
        }
    }
}
