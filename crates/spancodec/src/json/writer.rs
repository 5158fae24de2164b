use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::hex;
use crate::types::{Annotation, Endpoint, Span};

/// A span in the v2 JSON shape. Absent and default fields are omitted.
pub(crate) struct JsonV2<'a>(pub &'a Span);

impl Serialize for JsonV2<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let span = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("traceId", &span.trace_id().to_string())?;
        if let Some(parent_id) = span.parent_id() {
            map.serialize_entry("parentId", &hex::write_id(parent_id))?;
        }
        map.serialize_entry("id", &hex::write_id(span.id()))?;
        if let Some(kind) = span.kind() {
            map.serialize_entry("kind", kind.as_str())?;
        }
        if let Some(name) = span.name() {
            map.serialize_entry("name", name)?;
        }
        if let Some(ts) = span.timestamp() {
            map.serialize_entry("timestamp", &ts)?;
        }
        if let Some(duration) = span.duration() {
            map.serialize_entry("duration", &duration)?;
        }
        if let Some(ep) = span.local_endpoint().filter(|ep| !ep.is_empty()) {
            map.serialize_entry("localEndpoint", ep)?;
        }
        if let Some(ep) = span.remote_endpoint().filter(|ep| !ep.is_empty()) {
            map.serialize_entry("remoteEndpoint", ep)?;
        }
        if !span.annotations().is_empty() {
            map.serialize_entry("annotations", span.annotations())?;
        }
        if !span.tags().is_empty() {
            map.serialize_entry("tags", span.tags())?;
        }
        if span.debug() {
            map.serialize_entry("debug", &true)?;
        }
        if span.shared() {
            map.serialize_entry("shared", &true)?;
        }
        map.end()
    }
}

/// A JSON array of v2 spans.
pub(crate) struct JsonV2List<'a>(pub &'a [Span]);

impl Serialize for JsonV2List<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(JsonV2))
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = self.service_name() {
            map.serialize_entry("serviceName", name)?;
        }
        if let Some(ip) = self.ipv4() {
            map.serialize_entry("ipv4", &ip.to_string())?;
        }
        if let Some(ip) = self.ipv6() {
            map.serialize_entry("ipv6", &ip.to_string())?;
        }
        if let Some(port) = self.port() {
            map.serialize_entry("port", &port)?;
        }
        map.end()
    }
}

impl Serialize for Annotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("value", &self.value)?;
        map.end()
    }
}
