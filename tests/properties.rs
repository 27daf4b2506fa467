//! Extraction never fails, identity drives dedup, detail merges only add.

mod common;

use std::sync::Arc;

use common::*;
use scraper::Html;
use serde_json::json;
use smartspider::config::{Attribute, DetailPageConfig, FieldMapping, ListPageConfig};
use smartspider::dedup::{dedup_records, is_duplicate, DedupTracker};
use smartspider::events::MemorySink;
use smartspider::extract::{extract_records, html, json as json_extract};
use smartspider::fetch::{FetcherFactory, Page};
use smartspider::spider::DetailResolver;
use smartspider::Record;

const MARKUP: &[&str] = &[
    "",
    "<div",
    "<<<>>>",
    "<div class=\"item\"><a href=\"/x\">unterminated",
    "<table><tr><td>cell</table></div></span>",
    "<div class=\"item\"><img></div><div class=\"item\">two</div>",
];

const SELECTORS: &[&str] = &["", ".item", "a[href", "::::", "div > > p", "*", "#", "a"];

#[test]
fn test_markup_extraction_is_total() {
    let attributes = [
        Attribute::Text,
        Attribute::Html,
        Attribute::Named("href".to_string()),
        Attribute::Named(String::new()),
    ];

    for markup in MARKUP {
        let document = Html::parse_document(markup);
        for item_selector in SELECTORS {
            for item in html::select_items(&document, Some(*item_selector)) {
                for selector in SELECTORS {
                    for attribute in &attributes {
                        let _value: String = html::extract_value(item, selector, attribute);
                    }
                }
            }
        }
    }
}

#[test]
fn test_json_extraction_is_total() {
    let documents = [
        json!(null),
        json!([]),
        json!("plain"),
        json!({"a": {"b": [1, {"text": "rich"}, null]}}),
        json!({"a": [[[]]], "": {"": 1}}),
    ];
    let paths = ["", ".", "a", "a.b", "a.b.1", "a.b.99", "a.b.-1", "a..b", "a.b.1.text.x", "0"];

    for document in &documents {
        for path in paths {
            let _value: String = json_extract::extract_value(document, path);
        }
    }
    assert_eq!(json_extract::extract_value(&documents[3], "a.b.1"), "rich");
    assert_eq!(json_extract::extract_value(&documents[3], "a.b.2"), "");
}

#[test]
fn test_page_extraction_is_total() {
    let list = ListPageConfig {
        item_selector: Some("a[href".to_string()),
        list_selector: Some("data.items".to_string()),
        url_selector: Some("::".to_string()),
        fields: vec![FieldMapping::new("title", "{{", Attribute::Text)],
        ..Default::default()
    };
    let detail = DetailPageConfig {
        enabled: true,
        url_field: Some("title".to_string()),
        fields: vec![],
    };
    for markup in MARKUP {
        extract_records(&Page::Html(markup.to_string()), &list, BASE_URL, Some(&detail));
    }
    let records = extract_records(
        &Page::Json(json!({"data": {"items": [{"title": 1}, 7, null]}})),
        &list,
        BASE_URL,
        None,
    );
    assert_eq!(records.len(), 3);
}

#[test]
fn test_identity_ignores_other_fields() {
    let existing = vec![
        Record::from_pairs([("url", "/p/1"), ("title", "One"), ("price", "1")]),
        Record::from_pairs([("title", "Untracked"), ("price", "2")]),
    ];

    let same_url = Record::from_pairs([("url", "/p/1"), ("title", "Renamed"), ("price", "9")]);
    let same_title = Record::from_pairs([("title", "Untracked"), ("price", "3")]);
    let fresh = Record::from_pairs([("url", "/p/2"), ("title", "One")]);

    assert!(is_duplicate(&same_url, &existing));
    assert!(is_duplicate(&same_title, &existing));
    assert!(!is_duplicate(&fresh, &existing));

    let mut tracker = DedupTracker::new();
    for record in &existing {
        assert!(tracker.insert(record));
    }
    for candidate in [&same_url, &same_title, &fresh] {
        assert_eq!(tracker.is_duplicate(candidate), is_duplicate(candidate, &existing));
    }

    let merged = dedup_records(vec![existing[0].clone(), same_url, fresh.clone()]);
    assert_eq!(merged, vec![existing[0].clone(), fresh]);
}

#[tokio::test]
async fn test_detail_merge_never_removes_fields() {
    let detail = DetailPageConfig {
        enabled: true,
        url_field: Some("url".to_string()),
        fields: vec![
            FieldMapping::new("price", ".price", Attribute::Text),
            FieldMapping::new("stock", ".stock", Attribute::Text),
        ],
    };
    let script = Script::default()
        .page(
            "https://shop.test/p/1",
            Page::Html("<span class=\"price\">12.00</span><span class=\"stock\">4</span>".to_string()),
        )
        .page("https://shop.test/p/2", Page::Html("<p>moved</p>".to_string()));
    let factory = ScriptedFactory::new(script);
    let mut fetcher = factory.create().await.unwrap();

    let mut records: Vec<Record> = ["/p/1", "/p/2", "/p/3"]
        .iter()
        .map(|url| {
            let mut record = Record::from_pairs([("url", *url), ("title", "T"), ("price", "9.99")]);
            record.detail_url = Some(format!("https://shop.test{}", url));
            record
        })
        .collect();
    records.push(Record::from_pairs([("title", "no detail")]));
    let before: Vec<Vec<String>> = records
        .iter()
        .map(|r| r.fields.keys().cloned().collect())
        .collect();

    let sink = Arc::new(MemorySink::new());
    DetailResolver::new(&detail, std::time::Duration::ZERO, sink.as_ref())
        .resolve(fetcher.as_mut(), &mut records)
        .await;

    for (record, keys) in records.iter().zip(&before) {
        for key in keys {
            assert!(record.get(key).is_some(), "{} lost", key);
        }
        assert!(record.detail_url.is_none());
    }
    assert_eq!(records[0].get("price"), Some("12.00"));
    assert_eq!(records[0].get("stock"), Some("4"));
    assert_eq!(records[2].get("price"), Some("9.99"));
    assert_eq!(records[3], Record::from_pairs([("title", "no detail")]));
    assert_eq!(sink.events().len(), 1);
}
