//! The legacy v1 span shape, converted to the v2 model on read.
//!
//! A v1 span carries its kind implicitly through core annotations (`cs`,
//! `cr`, `sr`, `ss`, `ms`, `mr`) and its endpoints through the annotations'
//! hosts. When both the client and server side of an RPC reported into the
//! same v1 span, it is split into a client span and a shared server span.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::hex;
use crate::types::{Endpoint, Kind, Span, SpanBuilder};

use super::reader::{incomplete_annotation, Nullable, RawEndpoint};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct V1Span {
    #[serde(default)]
    trace_id: Nullable<String>,
    trace_id_high: Option<String>,
    parent_id: Option<String>,
    #[serde(default)]
    id: Nullable<String>,
    name: Option<String>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    annotations: Option<Vec<V1Annotation>>,
    binary_annotations: Option<Vec<V1BinaryAnnotation>>,
    debug: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct V1Annotation {
    timestamp: Option<u64>,
    value: Option<String>,
    endpoint: Option<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
struct V1BinaryAnnotation {
    key: Option<String>,
    value: Option<V1Value>,
    endpoint: Option<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum V1Value {
    Bool(bool),
    Text(String),
    Number(serde_json::Number),
}

impl V1Value {
    fn into_string(self) -> String {
        match self {
            V1Value::Bool(b) => b.to_string(),
            V1Value::Text(s) => s,
            V1Value::Number(n) => n.to_string(),
        }
    }
}

struct Event {
    timestamp: u64,
    value: String,
    endpoint: Option<Endpoint>,
}

/// One side of the span, found from its core annotations.
struct Side {
    kind: Kind,
    begin: Option<u64>,
    end: Option<u64>,
    endpoint: Option<Endpoint>,
}

impl Side {
    fn find(events: &[Event], kind: Kind, begin: &str, end: Option<&str>) -> Option<Side> {
        let begin = events.iter().find(|e| e.value == begin)?;
        let end = end.and_then(|end| events.iter().find(|e| e.value == end));
        Some(Side {
            kind,
            begin: Some(begin.timestamp),
            end: end.map(|e| e.timestamp),
            endpoint: begin
                .endpoint
                .clone()
                .or_else(|| end.and_then(|e| e.endpoint.clone())),
        })
    }

    fn duration(&self) -> Option<u64> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) if end >= begin => Some(end - begin),
            _ => None,
        }
    }

    /// Whether an annotation value is consumed by this side.
    fn owns(&self, value: &str) -> bool {
        match self.kind {
            Kind::Client => value == "cs" || value == "cr",
            Kind::Server => value == "sr" || value == "ss",
            Kind::Producer => value == "ms",
            Kind::Consumer => value == "mr",
        }
    }
}

impl V1Span {
    /// Converts to one span, or two when client and server shared this span.
    pub(crate) fn into_spans(self) -> Result<Vec<Span>> {
        let mut base = Span::builder();
        if let Some(trace_id) = self.trace_id.required()? {
            let mut trace_id = hex::parse_trace_id(&trace_id)?;
            if let Some(high) = self.trace_id_high {
                trace_id.high = hex::parse_id("traceIdHigh", &high)?;
            }
            base = base.trace_id(trace_id);
        }
        if let Some(parent_id) = self.parent_id {
            base = base.parent_id(hex::parse_id("parentId", &parent_id)?);
        }
        if let Some(id) = self.id.required()? {
            base = base.id(hex::parse_id("id", &id)?);
        }
        if let Some(name) = self.name {
            base = base.name(name);
        }
        base = base.debug(self.debug.unwrap_or(false));

        let mut events = Vec::new();
        for (i, a) in self.annotations.into_iter().flatten().enumerate() {
            let (timestamp, value) = match (a.timestamp, a.value) {
                (Some(ts), Some(value)) => (ts, value),
                (_, None) => return Err(incomplete_annotation(i, "value")),
                (None, _) => return Err(incomplete_annotation(i, "timestamp")),
            };
            events.push(Event {
                timestamp,
                value,
                endpoint: a.endpoint.and_then(RawEndpoint::into_endpoint),
            });
        }

        let client = Side::find(&events, Kind::Client, "cs", Some("cr"));
        let server = Side::find(&events, Kind::Server, "sr", Some("ss"));
        let sides: Vec<Side> = match (client, server) {
            (Some(client), Some(server)) => vec![client, server],
            (Some(side), None) | (None, Some(side)) => vec![side],
            (None, None) => Side::find(&events, Kind::Producer, "ms", None)
                .or_else(|| Side::find(&events, Kind::Consumer, "mr", None))
                .into_iter()
                .collect(),
        };

        let mut spans: Vec<SpanBuilder> = Vec::with_capacity(sides.len().max(1));
        for (i, side) in sides.iter().enumerate() {
            let mut b = base
                .clone()
                .kind(side.kind)
                .local_endpoint(side.endpoint.clone());
            if i == 0 {
                b = b
                    .timestamp(self.timestamp.or(side.begin).unwrap_or(0))
                    .duration(self.duration.or_else(|| side.duration()).unwrap_or(0));
                // A lone server side without a span timestamp was started by
                // a client that reported separately.
                if side.kind == Kind::Server && self.timestamp.is_none() {
                    b = b.shared(true);
                }
            } else {
                b = b
                    .timestamp(side.begin.unwrap_or(0))
                    .duration(side.duration().unwrap_or(0))
                    .shared(true);
            }
            spans.push(b);
        }
        if spans.len() > 1 {
            log::trace!("splitting v1 span into client and server spans");
        }
        if spans.is_empty() {
            spans.push(
                base.timestamp(self.timestamp.unwrap_or(0))
                    .duration(self.duration.unwrap_or(0)),
            );
        }

        for event in events {
            if sides.iter().any(|side| side.owns(&event.value)) {
                continue;
            }
            let i = target(&spans, event.endpoint.as_ref());
            spans[i] = adopt_endpoint(std::mem::take(&mut spans[i]), event.endpoint)
                .add_annotation(event.timestamp, event.value);
        }

        for (i, ba) in self.binary_annotations.into_iter().flatten().enumerate() {
            let key = ba
                .key
                .ok_or_else(|| incomplete_binary_annotation(i, "key"))?;
            let value = ba
                .value
                .ok_or_else(|| incomplete_binary_annotation(i, "value"))?;
            let endpoint = ba.endpoint.and_then(RawEndpoint::into_endpoint);

            let remote_kinds: &[Kind] = match key.as_str() {
                "sa" => &[Kind::Client],
                "ca" => &[Kind::Server],
                "ma" => &[Kind::Producer, Kind::Consumer],
                _ => &[],
            };
            if !remote_kinds.is_empty() {
                if matches!(value, V1Value::Bool(true)) {
                    let i = spans
                        .iter()
                        .position(|b| b.kind_ref().is_some_and(|k| remote_kinds.contains(&k)))
                        .unwrap_or(0);
                    spans[i] = std::mem::take(&mut spans[i]).remote_endpoint(endpoint);
                }
                continue;
            }

            let i = target(&spans, endpoint.as_ref());
            spans[i] = adopt_endpoint(std::mem::take(&mut spans[i]), endpoint)
                .put_tag(key, value.into_string());
        }

        spans.into_iter().map(SpanBuilder::build).collect()
    }
}

/// Index of the span an annotation belongs to: the server half when the
/// annotation was recorded by the server's host, else the first span.
fn target(spans: &[SpanBuilder], endpoint: Option<&Endpoint>) -> usize {
    match (spans, endpoint) {
        ([first, second], Some(ep))
            if second.local_endpoint_ref() == Some(ep) && first.local_endpoint_ref() != Some(ep) =>
        {
            1
        }
        _ => 0,
    }
}

fn adopt_endpoint(b: SpanBuilder, endpoint: Option<Endpoint>) -> SpanBuilder {
    if b.local_endpoint_ref().is_none() {
        b.local_endpoint(endpoint)
    } else {
        b
    }
}

fn incomplete_binary_annotation(index: usize, field: &str) -> Error {
    Error::invalid(format!(
        "Incomplete binary annotation at $.binaryAnnotations[{index}].{field}"
    ))
}
