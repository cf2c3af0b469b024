//! Dispatch classifier for the Bridge channel
//!
//! Bridge requests carry a short type tag in front of their body:
//!
//! ```text
//! +-----+-----------------+----------------------+
//! | len | tag (len bytes) | body (rest, opaque)  |
//! +-----+-----------------+----------------------+
//! ```
//!
//! The tag is the only part of a payload the router ever reads. It is
//! resolved against a fixed table built when the router is created.

use super::error::RouteError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Longest accepted type tag, in bytes
pub const MAX_TAG_LEN: usize = 64;

/// Handler a Bridge request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerCategory {
    /// Liveness probe, answers `pong`
    Heartbeat,
    /// Returns the request body unchanged
    Echo,
    /// Returns a JSON snapshot of router state
    Introspection,
    /// Returns the FNV-1a 64 hash of the body, little-endian
    Digest,
}

impl HandlerCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerCategory::Heartbeat => "heartbeat",
            HandlerCategory::Echo => "echo",
            HandlerCategory::Introspection => "introspection",
            HandlerCategory::Digest => "digest",
        }
    }
}

impl fmt::Display for HandlerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BUILTIN_TAGS: [(&str, HandlerCategory); 4] = [
    ("ping", HandlerCategory::Heartbeat),
    ("echo", HandlerCategory::Echo),
    ("status", HandlerCategory::Introspection),
    ("digest", HandlerCategory::Digest),
];

/// Fixed tag → category table
#[derive(Debug, Clone)]
pub struct Classifier {
    table: HashMap<&'static str, HandlerCategory>,
}

impl Classifier {
    /// Build the table of known tags
    pub fn builtin() -> Self {
        Self {
            table: BUILTIN_TAGS.iter().copied().collect(),
        }
    }

    /// Resolve a tag. `None` means the tag is unknown.
    pub fn classify(&self, tag: &str) -> Option<HandlerCategory> {
        self.table.get(tag).copied()
    }

    /// Known tags, sorted
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.table.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A Bridge payload split into its tag and body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeRequest<'a> {
    pub tag: &'a str,
    pub body: &'a [u8],
}

impl<'a> BridgeRequest<'a> {
    /// Split a raw payload. Fails on an empty payload, a zero or oversized
    /// tag length, a truncated tag, or a tag that is not ASCII.
    pub fn parse(payload: &'a [u8]) -> Result<Self, RouteError> {
        let (&len, rest) = payload
            .split_first()
            .ok_or_else(|| RouteError::MalformedRequest("empty bridge payload".to_string()))?;
        let len = usize::from(len);

        if len == 0 || len > MAX_TAG_LEN {
            return Err(RouteError::MalformedRequest(format!(
                "type tag length {} outside 1..={}",
                len, MAX_TAG_LEN
            )));
        }
        if rest.len() < len {
            return Err(RouteError::MalformedRequest(format!(
                "type tag truncated: expected {} bytes, got {}",
                len,
                rest.len()
            )));
        }

        let (tag, body) = rest.split_at(len);
        if !tag.is_ascii() {
            return Err(RouteError::MalformedRequest(
                "type tag is not ASCII".to_string(),
            ));
        }
        let tag = std::str::from_utf8(tag)
            .map_err(|e| RouteError::MalformedRequest(format!("type tag: {}", e)))?;

        Ok(Self { tag, body })
    }
}

/// Frame a Bridge payload from a tag and body
pub fn encode_bridge_request(tag: &str, body: &[u8]) -> Result<Vec<u8>, RouteError> {
    let len = tag.len();
    if len == 0 || len > MAX_TAG_LEN || !tag.is_ascii() {
        return Err(RouteError::MalformedRequest(format!(
            "type tag '{}' must be 1..={} ASCII bytes",
            tag, MAX_TAG_LEN
        )));
    }

    let mut payload = Vec::with_capacity(1 + len + body.len());
    // len <= MAX_TAG_LEN fits in a byte
    payload.push(len as u8);
    payload.extend_from_slice(tag.as_bytes());
    payload.extend_from_slice(body);
    Ok(payload)
}

/// FNV-1a, 64 bit
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}
