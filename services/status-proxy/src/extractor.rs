//! Recovery of a status payload embedded in an HTML page
//!
//! When the provider answers with its rendered status page instead of the
//! JSON document, the same payload is still present inside the page's
//! hydration data. Its key path changes between provider releases, so the
//! payload is located by shape rather than by path.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::entities;
use crate::model::StatusPayload;

/// `id` of the script block carrying the framework's hydration data
pub const NEXT_DATA_ID: &str = "__NEXT_DATA__";

/// Deepest nesting level inspected by [`find_payload`]
pub const MAX_SEARCH_DEPTH: usize = 50;

// Quoted attribute values may contain `>`
static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</script\s*>"#)
        .expect("script pattern is a valid regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z_:][a-z0-9_:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute pattern is a valid regex")
});

/// Which script block the payload was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    NextData,
    JsonScript,
}

impl FallbackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackSource::NextData => "next-data",
            FallbackSource::JsonScript => "json-script",
        }
    }
}

/// A payload recovered from HTML
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub payload: StatusPayload,
    pub source: FallbackSource,
}

#[derive(Debug)]
struct ScriptBlock<'a> {
    id: Option<String>,
    mime: Option<String>,
    body: &'a str,
}

impl ScriptBlock<'_> {
    fn is_next_data(&self) -> bool {
        self.id.as_deref() == Some(NEXT_DATA_ID)
    }

    fn is_json(&self) -> bool {
        self.mime
            .as_deref()
            .map(|mime| mime.trim().to_ascii_lowercase())
            .is_some_and(|mime| {
                mime == "application/json" || mime.ends_with("+json")
            })
    }
}

fn script_blocks(html: &str) -> impl Iterator<Item = ScriptBlock<'_>> {
    SCRIPT_TAG.captures_iter(html).map(|caps| {
        let attributes = caps.get(1).map_or("", |m| m.as_str());
        ScriptBlock {
            id: attribute(attributes, "id"),
            mime: attribute(attributes, "type"),
            body: caps.get(2).map_or("", |m| m.as_str()),
        }
    })
}

fn attribute(attributes: &str, name: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attributes).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
    })
}

fn payload_from_block(block: &ScriptBlock<'_>) -> Option<StatusPayload> {
    let decoded = entities::decode(block.body);
    match serde_json::from_str::<Value>(decoded.trim()) {
        Ok(value) => find_payload(&value),
        Err(e) => {
            tracing::debug!(
                "Skipping script block {:?} that is not valid JSON: {}",
                block.id,
                e
            );
            None
        }
    }
}

/// Locate a status payload inside an HTML document
///
/// The hydration block is tried first. Failing that, every JSON-typed
/// script block is tried in document order and the first one containing a
/// payload wins.
pub fn extract(html: &str) -> Option<Extracted> {
    let blocks: Vec<ScriptBlock<'_>> = script_blocks(html).collect();

    if let Some(next_data) = blocks.iter().find(|b| b.is_next_data()) {
        if let Some(payload) = payload_from_block(next_data) {
            return Some(Extracted {
                payload,
                source: FallbackSource::NextData,
            });
        }
        tracing::debug!(
            "{} block present but holds no status payload",
            NEXT_DATA_ID
        );
    }

    blocks
        .iter()
        .filter(|b| b.is_json() && !b.is_next_data())
        .find_map(payload_from_block)
        .map(|payload| Extracted {
            payload,
            source: FallbackSource::JsonScript,
        })
}

/// Depth-first search for the first value shaped like a status payload.
/// Object fields and array elements are visited in document order.
pub fn find_payload(value: &Value) -> Option<StatusPayload> {
    search(value, 0)
}

fn search(value: &Value, depth: usize) -> Option<StatusPayload> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    if let Some(payload) = StatusPayload::from_shape(value) {
        return Some(payload);
    }
    match value {
        Value::Object(fields) => fields.values().find_map(|v| search(v, depth + 1)),
        Value::Array(items) => items.iter().find_map(|v| search(v, depth + 1)),
        _ => None,
    }
}
