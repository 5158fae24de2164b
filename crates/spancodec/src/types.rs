use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::hex;

// === Identifiers ===

/// A trace identifier: 64-bit, or 128-bit when `high` is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TraceId {
    pub high: u64,
    pub low: u64,
}

impl TraceId {
    pub fn new(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    pub fn is_128bit(&self) -> bool {
        self.high != 0
    }

    /// Number of raw bytes this ID occupies on the binary wire.
    pub(crate) fn byte_len(&self) -> usize {
        if self.is_128bit() {
            16
        } else {
            8
        }
    }
}

impl From<u64> for TraceId {
    fn from(low: u64) -> Self {
        TraceId { high: 0, low }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::write_trace_id(self))
    }
}

impl FromStr for TraceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        hex::parse_trace_id(s)
    }
}

// === Span kind ===

/// The role of the local endpoint in a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Client = 1,
    Server = 2,
    Producer = 3,
    Consumer = 4,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Client => "CLIENT",
            Kind::Server => "SERVER",
            Kind::Producer => "PRODUCER",
            Kind::Consumer => "CONSUMER",
        }
    }

    /// Returns `None` for names this codec doesn't know about.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CLIENT" => Some(Kind::Client),
            "SERVER" => Some(Kind::Server),
            "PRODUCER" => Some(Kind::Producer),
            "CONSUMER" => Some(Kind::Consumer),
            _ => None,
        }
    }

    pub(crate) fn from_proto(v: u64) -> Option<Self> {
        match v {
            1 => Some(Kind::Client),
            2 => Some(Kind::Server),
            3 => Some(Kind::Producer),
            4 => Some(Kind::Consumer),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === Endpoint ===

/// The network context of a node in the service graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    service_name: Option<String>,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    port: Option<u16>,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::default()
    }

    pub fn to_builder(&self) -> EndpointBuilder {
        EndpointBuilder {
            endpoint: self.clone(),
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        self.ipv6
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// True when no field is set. Empty endpoints are never attached to a span.
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.ipv4.is_none()
            && self.ipv6.is_none()
            && self.port.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointBuilder {
    endpoint: Endpoint,
}

impl EndpointBuilder {
    /// Sets the service name. An empty name clears it.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.endpoint.service_name = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.endpoint.ipv4 = Some(ip);
        self
    }

    /// Sets the IPv6 address. IPv4-mapped addresses are stored as IPv4.
    pub fn ipv6(mut self, ip: Ipv6Addr) -> Self {
        match ip.to_ipv4_mapped() {
            Some(v4) => self.endpoint.ipv4 = Some(v4),
            None => self.endpoint.ipv6 = Some(ip),
        }
        self
    }

    pub fn ip_addr(self, ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => self.ipv4(v4),
            IpAddr::V6(v6) => self.ipv6(v6),
        }
    }

    /// Parses either address family from text. Unparseable input is ignored.
    pub fn ip(self, text: &str) -> Self {
        match text.parse::<IpAddr>() {
            Ok(ip) => self.ip_addr(ip),
            Err(_) => {
                log::trace!("ignoring unparseable endpoint address {text:?}");
                self
            }
        }
    }

    /// Sets the port. Zero means absent.
    pub fn port(mut self, port: u16) -> Self {
        self.endpoint.port = if port == 0 { None } else { Some(port) };
        self
    }

    pub fn build(self) -> Endpoint {
        self.endpoint
    }
}

// === Annotation ===

/// A timestamped event attached to a span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    pub value: String,
}

impl Annotation {
    pub fn new(timestamp: u64, value: impl Into<String>) -> Self {
        Annotation {
            timestamp,
            value: value.into(),
        }
    }
}

// === Span ===

/// A timed operation in a distributed trace.
///
/// Spans are built with [`SpanBuilder`], which normalizes default values
/// (zero timestamps, empty names, empty endpoints) to absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    trace_id: TraceId,
    parent_id: Option<u64>,
    id: u64,
    kind: Option<Kind>,
    name: Option<String>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    local_endpoint: Option<Endpoint>,
    remote_endpoint: Option<Endpoint>,
    annotations: Vec<Annotation>,
    tags: IndexMap<String, String>,
    debug: bool,
    shared: bool,
}

impl Span {
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    pub fn to_builder(&self) -> SpanBuilder {
        SpanBuilder {
            trace_id: Some(self.trace_id),
            parent_id: self.parent_id,
            id: Some(self.id),
            kind: self.kind,
            name: self.name.clone(),
            timestamp: self.timestamp,
            duration: self.duration,
            local_endpoint: self.local_endpoint.clone(),
            remote_endpoint: self.remote_endpoint.clone(),
            annotations: self.annotations.clone(),
            tags: self.tags.clone(),
            debug: self.debug,
            shared: self.shared,
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Start time in microseconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Duration in microseconds.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn local_endpoint(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }

    pub fn remote_endpoint(&self) -> Option<&Endpoint> {
        self.remote_endpoint.as_ref()
    }

    pub fn local_service_name(&self) -> Option<&str> {
        self.local_endpoint.as_ref().and_then(Endpoint::service_name)
    }

    pub fn remote_service_name(&self) -> Option<&str> {
        self.remote_endpoint.as_ref().and_then(Endpoint::service_name)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn tags(&self) -> &IndexMap<String, String> {
        &self.tags
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn shared(&self) -> bool {
        self.shared
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpanBuilder {
    trace_id: Option<TraceId>,
    parent_id: Option<u64>,
    id: Option<u64>,
    kind: Option<Kind>,
    name: Option<String>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    local_endpoint: Option<Endpoint>,
    remote_endpoint: Option<Endpoint>,
    annotations: Vec<Annotation>,
    tags: IndexMap<String, String>,
    debug: bool,
    shared: bool,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the parent ID. Zero means this is a root span.
    pub fn parent_id(mut self, parent_id: u64) -> Self {
        self.parent_id = non_zero(parent_id);
        self
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn kind(mut self, kind: impl Into<Option<Kind>>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = non_zero(timestamp);
        self
    }

    pub fn duration(mut self, duration: u64) -> Self {
        self.duration = non_zero(duration);
        self
    }

    pub fn clear_duration(mut self) -> Self {
        self.duration = None;
        self
    }

    /// Sets the local endpoint. Empty endpoints are dropped.
    pub fn local_endpoint(mut self, endpoint: impl Into<Option<Endpoint>>) -> Self {
        self.local_endpoint = endpoint.into().filter(|e| !e.is_empty());
        self
    }

    /// Sets the remote endpoint. Empty endpoints are dropped.
    pub fn remote_endpoint(mut self, endpoint: impl Into<Option<Endpoint>>) -> Self {
        self.remote_endpoint = endpoint.into().filter(|e| !e.is_empty());
        self
    }

    pub fn add_annotation(mut self, timestamp: u64, value: impl Into<String>) -> Self {
        self.annotations.push(Annotation::new(timestamp, value));
        self
    }

    /// Adds a tag, replacing the value of an existing key in place.
    pub fn put_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub(crate) fn local_endpoint_ref(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }

    pub(crate) fn kind_ref(&self) -> Option<Kind> {
        self.kind
    }

    pub fn build(self) -> Result<Span> {
        let trace_id = self
            .trace_id
            .ok_or_else(|| Error::invalid("Missing: traceId"))?;
        let id = self.id.ok_or_else(|| Error::invalid("Missing: id"))?;
        Ok(Span {
            trace_id,
            parent_id: self.parent_id,
            id,
            kind: self.kind,
            name: self.name,
            timestamp: self.timestamp,
            duration: self.duration,
            local_endpoint: self.local_endpoint,
            remote_endpoint: self.remote_endpoint,
            annotations: self.annotations,
            tags: self.tags,
            debug: self.debug,
            shared: self.shared,
        })
    }
}

fn non_zero(val: u64) -> Option<u64> {
    if val == 0 {
        None
    } else {
        Some(val)
    }
}
