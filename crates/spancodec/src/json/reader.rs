//! Lenient reader of the v2 JSON span shape.
//!
//! Unknown fields are ignored, fields may appear in any order, a repeated
//! field keeps its last value, and an explicit `null` is the same as an
//! absent field except where a value is mandatory.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::hex;
use crate::types::{Endpoint, Kind, Span, SpanBuilder};

/// A field that distinguishes an explicit `null` from a missing key.
#[derive(Debug, Default)]
pub(crate) enum Nullable<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Nullable::Value(value),
            None => Nullable::Null,
        })
    }
}

impl Nullable<String> {
    /// The value of a mandatory string field, or `None` if the key is missing.
    pub(crate) fn required(self) -> Result<Option<String>> {
        match self {
            Nullable::Missing => Ok(None),
            Nullable::Null => Err(Error::invalid("Expected a string but was NULL")),
            Nullable::Value(v) => Ok(Some(v)),
        }
    }
}

/// Implements `Deserialize` for a struct whose fields all default to absent.
/// Unknown keys are skipped and a repeated key overwrites the earlier value.
macro_rules! lenient_object {
    ($ty:ident, $expecting:literal, { $($key:literal => $field:ident),* $(,)? }) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                struct ObjectVisitor;

                impl<'de> Visitor<'de> for ObjectVisitor {
                    type Value = $ty;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str($expecting)
                    }

                    fn visit_map<A: MapAccess<'de>>(
                        self,
                        mut map: A,
                    ) -> std::result::Result<$ty, A::Error> {
                        let mut out = <$ty>::default();
                        while let Some(key) = map.next_key::<String>()? {
                            match key.as_str() {
                                $($key => out.$field = map.next_value()?,)*
                                _ => {
                                    map.next_value::<IgnoredAny>()?;
                                }
                            }
                        }
                        Ok(out)
                    }
                }

                deserializer.deserialize_map(ObjectVisitor)
            }
        }
    };
}

#[derive(Debug, Default)]
pub(crate) struct RawSpan {
    trace_id: Nullable<String>,
    parent_id: Option<String>,
    id: Nullable<String>,
    kind: Option<String>,
    name: Option<String>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    local_endpoint: Option<RawEndpoint>,
    remote_endpoint: Option<RawEndpoint>,
    annotations: Option<Vec<RawAnnotation>>,
    tags: Option<IndexMap<String, Option<String>>>,
    debug: Option<bool>,
    shared: Option<bool>,
}

lenient_object!(RawSpan, "a span object", {
    "traceId" => trace_id,
    "parentId" => parent_id,
    "id" => id,
    "kind" => kind,
    "name" => name,
    "timestamp" => timestamp,
    "duration" => duration,
    "localEndpoint" => local_endpoint,
    "remoteEndpoint" => remote_endpoint,
    "annotations" => annotations,
    "tags" => tags,
    "debug" => debug,
    "shared" => shared,
});

#[derive(Debug, Default)]
pub(crate) struct RawEndpoint {
    service_name: Option<String>,
    ipv4: Option<String>,
    ipv6: Option<String>,
    port: Option<u16>,
}

lenient_object!(RawEndpoint, "an endpoint object", {
    "serviceName" => service_name,
    "ipv4" => ipv4,
    "ipv6" => ipv6,
    "port" => port,
});

impl RawEndpoint {
    /// Converts to an endpoint, collapsing one with no usable field to `None`.
    pub(crate) fn into_endpoint(self) -> Option<Endpoint> {
        let mut b = Endpoint::builder();
        if let Some(name) = self.service_name {
            b = b.service_name(name);
        }
        if let Some(ip) = &self.ipv4 {
            b = b.ip(ip);
        }
        if let Some(ip) = &self.ipv6 {
            b = b.ip(ip);
        }
        if let Some(port) = self.port {
            b = b.port(port);
        }
        Some(b.build()).filter(|ep| !ep.is_empty())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RawAnnotation {
    timestamp: Option<u64>,
    value: Option<String>,
}

lenient_object!(RawAnnotation, "an annotation object", {
    "timestamp" => timestamp,
    "value" => value,
});

impl RawSpan {
    pub(crate) fn into_span(self) -> Result<Span> {
        let mut b = Span::builder();
        if let Some(trace_id) = self.trace_id.required()? {
            b = b.trace_id(hex::parse_trace_id(&trace_id)?);
        }
        if let Some(parent_id) = self.parent_id {
            b = b.parent_id(hex::parse_id("parentId", &parent_id)?);
        }
        if let Some(id) = self.id.required()? {
            b = b.id(hex::parse_id("id", &id)?);
        }
        if let Some(kind) = self.kind {
            b = b.kind(parse_kind(&kind));
        }
        if let Some(name) = self.name {
            b = b.name(name);
        }
        if let Some(ts) = self.timestamp {
            b = b.timestamp(ts);
        }
        if let Some(duration) = self.duration {
            b = b.duration(duration);
        }
        b = b
            .local_endpoint(self.local_endpoint.and_then(RawEndpoint::into_endpoint))
            .remote_endpoint(self.remote_endpoint.and_then(RawEndpoint::into_endpoint));
        for (i, annotation) in self.annotations.into_iter().flatten().enumerate() {
            let (timestamp, value) = match (annotation.timestamp, annotation.value) {
                (Some(ts), Some(value)) => (ts, value),
                (_, None) => return Err(incomplete_annotation(i, "value")),
                (None, _) => return Err(incomplete_annotation(i, "timestamp")),
            };
            b = b.add_annotation(timestamp, value);
        }
        b = put_tags(b, self.tags)?;
        b.debug(self.debug.unwrap_or(false))
            .shared(self.shared.unwrap_or(false))
            .build()
    }
}

fn put_tags(
    mut b: SpanBuilder,
    tags: Option<IndexMap<String, Option<String>>>,
) -> Result<SpanBuilder> {
    for (key, value) in tags.into_iter().flatten() {
        match value {
            Some(value) => b = b.put_tag(key, value),
            None => return Err(Error::invalid(format!("No value at $.tags.{key}"))),
        }
    }
    Ok(b)
}

pub(crate) fn incomplete_annotation(index: usize, field: &str) -> Error {
    Error::invalid(format!(
        "Incomplete annotation at $.annotations[{index}].{field}"
    ))
}

/// Unknown kinds are dropped rather than rejected.
fn parse_kind(name: &str) -> Option<Kind> {
    let kind = Kind::from_name(name);
    if kind.is_none() {
        log::trace!("ignoring unknown span kind {name:?}");
    }
    kind
}
