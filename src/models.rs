//! Extracted records and the result set they accumulate into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One extracted item: field name to string value.
///
/// `detail_url` is transient; it is never serialized and is cleared once the
/// detail page has been resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(skip)]
    pub detail_url: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            detail_url: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key used to decide whether two records describe the same item:
    /// the first non-empty of `url`, `title`, else the whole record.
    pub fn identity_key(&self) -> String {
        for field in ["url", "title"] {
            if let Some(value) = self.get(field).filter(|v| !v.is_empty()) {
                return value.to_string();
            }
        }
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    /// Overlay `other` onto this record; existing keys are overwritten, none removed.
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }
}

/// Ordered, append-only collection of records for one crawl.
pub type ResultSet = Vec<Record>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_url_then_title() {
        let rec = Record::from_pairs([("url", "https://a/1"), ("title", "One")]);
        assert_eq!(rec.identity_key(), "https://a/1");

        let rec = Record::from_pairs([("url", ""), ("title", "One")]);
        assert_eq!(rec.identity_key(), "One");

        let rec = Record::from_pairs([("price", "9.99")]);
        assert_eq!(rec.identity_key(), r#"{"price":"9.99"}"#);
    }

    #[test]
    fn test_detail_url_not_serialized() {
        let mut rec = Record::from_pairs([("title", "One")]);
        rec.detail_url = Some("https://a/detail".to_string());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json, serde_json::json!({"title": "One"}));
    }

    #[test]
    fn test_merge_overwrites_and_keeps() {
        let mut rec = Record::from_pairs([("title", "One"), ("price", "1")]);
        rec.merge(Record::from_pairs([("price", "2"), ("brand", "Acme")]));
        assert_eq!(rec.get("title"), Some("One"));
        assert_eq!(rec.get("price"), Some("2"));
        assert_eq!(rec.get("brand"), Some("Acme"));
    }
}
