//! In-memory article representation and the section-data response shape.

use serde::{Deserialize, Serialize};
use url::Url;

/// A parsed article as handed to the interceptor by the article provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Cache identity, usually the canonical article URL or title key.
    pub key: String,
    /// Base URL relative image sources are resolved against.
    pub base_url: Url,
    /// Sections in document order.
    pub sections: Vec<Section>,
}

/// A titled sub-unit of an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    /// Heading text.
    pub line: String,
    /// Heading level (1 for the lead section).
    pub level: u8,
    pub anchor: String,
    /// Section body HTML.
    pub html: String,
}

/// JSON body served on section-data routes:
/// `{"mobileview":{"sections":[...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDataResponse {
    pub mobileview: MobileView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileView {
    pub sections: Vec<SectionRecord>,
}

/// One section with its HTML already rewritten for a target width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: i64,
    pub line: String,
    /// Serialized as a string on the wire.
    pub level: String,
    pub anchor: String,
    pub text: String,
}

impl SectionRecord {
    pub fn new(section: &Section, text: String) -> Self {
        Self {
            id: section.id,
            line: section.line.clone(),
            level: section.level.to_string(),
            anchor: section.anchor.clone(),
            text,
        }
    }
}

impl SectionDataResponse {
    pub fn new(sections: Vec<SectionRecord>) -> Self {
        Self { mobileview: MobileView { sections } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_data_shape() {
        let section = Section { id: 2, line: "History".into(), level: 2, anchor: "History".into(), html: String::new() };
        let response = SectionDataResponse::new(vec![SectionRecord::new(&section, "<p>x</p>".into())]);

        let value = serde_json::to_value(&response).unwrap();
        let record = &value["mobileview"]["sections"][0];
        assert_eq!(record["id"], 2);
        assert_eq!(record["line"], "History");
        assert_eq!(record["level"], "2");
        assert_eq!(record["anchor"], "History");
        assert_eq!(record["text"], "<p>x</p>");
    }

    #[test]
    fn test_article_json_roundtrip_fields() {
        let json = r#"{
            "key": "Rust",
            "base_url": "https://en.example.org/wiki/Rust",
            "sections": [{"id": 0, "line": "", "level": 1, "anchor": "", "html": "<p>lead</p>"}]
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.key, "Rust");
        assert_eq!(article.base_url.host_str(), Some("en.example.org"));
        assert_eq!(article.sections.len(), 1);
        assert_eq!(article.sections[0].html, "<p>lead</p>");
    }
}
