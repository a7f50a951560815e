//! Attribute-level view of a single `<img ...>` tag.
//!
//! Attribute values keep their source text. Rendering re-emits that text
//! verbatim and escapes only values assigned with [`ImageTag::set`].

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([^\s"'<>/=]+)(?:\s*=\s*("([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("invalid attribute regex")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|(quot|apos|lt|gt|amp));").expect("invalid entity regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    /// Decoded value; `None` for a bare attribute.
    value: Option<String>,
    /// Value as written in the source, quotes included. Cleared by `set`.
    source: Option<String>,
}

/// Parsed image tag with attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    attrs: Vec<Attribute>,
    self_closing: bool,
}

impl ImageTag {
    /// Parse the text of an opening image tag, `<img` through `>`.
    pub fn parse(tag: &str) -> Self {
        let inner = tag
            .get(4..)
            .unwrap_or_default()
            .trim_end_matches('>');
        let self_closing = inner.trim_end().ends_with('/');

        let attrs = ATTRIBUTE
            .captures_iter(inner)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().to_string();
                let value = caps
                    .get(3)
                    .or_else(|| caps.get(4))
                    .or_else(|| caps.get(5))
                    .map(|m| decode_entities(m.as_str()));
                let source = caps.get(2).map(|m| m.as_str().to_string());
                Some(Attribute { name, value, source })
            })
            .collect();

        Self { attrs, self_closing }
    }

    fn find(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Decoded value of attribute `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|a| a.value.as_deref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Replace the value of `name`, or append the attribute when absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.attrs.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(slot) => {
                slot.value = value;
                slot.source = None;
            }
            None => self.attrs.push(Attribute { name: name.to_string(), value, source: None }),
        }
    }

    /// Rename attribute `from` to `to`, dropping any existing `to`.
    pub fn rename(&mut self, from: &str, to: &str) {
        if !self.has(from) {
            return;
        }
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(to));
        for attr in self.attrs.iter_mut() {
            if attr.name.eq_ignore_ascii_case(from) {
                attr.name = to.to_string();
            }
        }
    }

    /// Integer prefix of a dimension attribute, e.g. `220` from `"220px"`.
    pub fn dimension(&self, name: &str) -> Option<u32> {
        let value = self.get(name)?.trim();
        let digits = value.find(|c: char| !c.is_ascii_digit()).map_or(value, |end| &value[..end]);
        digits.parse().ok()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("<img");
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            match (&attr.source, &attr.value) {
                (Some(source), _) => {
                    out.push('=');
                    out.push_str(source);
                }
                (None, Some(value)) => {
                    out.push_str("=\"");
                    out.push_str(&encode_entities(value));
                    out.push('"');
                }
                (None, None) => {}
            }
        }
        out.push_str(if self.self_closing { " />" } else { ">" });
        out
    }
}

/// Decode character references and the predefined named entities in one
/// pass. Other named entities are left as written.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    ENTITY
        .replace_all(value, |caps: &Captures| {
            let code = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(dec), _, _) => dec.as_str().parse().ok(),
                (_, Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (_, _, Some(named)) => match named.as_str() {
                    "quot" => Some(0x22),
                    "apos" => Some(0x27),
                    "lt" => Some(0x3c),
                    "gt" => Some(0x3e),
                    _ => Some(0x26),
                },
                _ => None,
            };
            code.and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn encode_entities(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
