//! Decoding of the HTML character references found in embedded script payloads

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Recognised references and the characters they stand for
const ENTITIES: [(&str, &str); 11] = [
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&amp;", "&"),
    ("&#38;", "&"),
    ("&lt;", "<"),
    ("&#60;", "<"),
    ("&gt;", ">"),
    ("&#62;", ">"),
    ("&#39;", "'"),
    ("&#x27;", "'"),
    ("&#x2F;", "/"),
];

static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = ENTITIES
        .iter()
        .map(|(entity, _)| regex::escape(entity))
        .collect();
    Regex::new(&alternatives.join("|")).expect("entity pattern is a valid regex")
});

/// Replace the fixed set of character references with their literal
/// characters in a single left-to-right pass. Anything else is left as is,
/// and replaced text is never rescanned (`&amp;quot;` becomes `&quot;`).
pub fn decode(text: &str) -> Cow<'_, str> {
    ENTITY_PATTERN.replace_all(text, |caps: &regex::Captures<'_>| {
        let entity = &caps[0];
        match ENTITIES.iter().find(|(candidate, _)| *candidate == entity) {
            Some((_, literal)) => (*literal).to_string(),
            None => entity.to_string(),
        }
    })
}
