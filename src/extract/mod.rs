//! Page to record extraction.
//!
//! Everything here is synchronous. Parsed markup (`scraper::Html`) is not
//! `Send`, so callers parse, extract, and drop it between awaits.

pub mod html;
pub mod json;

use scraper::Html;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DetailPageConfig, FieldMapping, ListPageConfig, PaginationConfig};
use crate::fetch::Page;
use crate::models::Record;

/// Resolve a possibly relative link against the crawl's base URL.
pub fn resolve_url(base_url: &str, link: &str) -> String {
    if link.is_empty() {
        return String::new();
    }
    match url::Url::parse(base_url).and_then(|base| base.join(link)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Extract every list item on `page` into a record.
///
/// When `detail` is set, each record also carries the link to its detail
/// page, taken from `list.url_selector` or else from the `url_field` value.
pub fn extract_records(
    page: &Page,
    list: &ListPageConfig,
    base_url: &str,
    detail: Option<&DetailPageConfig>,
) -> Vec<Record> {
    if list.fields.is_empty() {
        warn!("No list fields configured, nothing to extract");
        return Vec::new();
    }

    let mut records = match page {
        Page::Json(data) => extract_json_records(data, list),
        Page::Html(markup) => extract_html_records(markup, list, base_url, detail.is_some()),
    };

    if let Some(detail) = detail {
        if let Some(ref field) = detail.url_field {
            for record in records.iter_mut().filter(|r| r.detail_url.is_none()) {
                let link = record.get(field).unwrap_or_default();
                if !link.is_empty() {
                    record.detail_url = Some(resolve_url(base_url, link));
                }
            }
        }
    }

    debug!("Extracted {} records", records.len());
    records
}

fn extract_json_records(data: &Value, list: &ListPageConfig) -> Vec<Record> {
    json::list_items(data, list.list_selector.as_deref())
        .into_iter()
        .map(|item| {
            let mut record = Record::new();
            for field in &list.fields {
                record.insert(&field.name, json::extract_value(item, &field.selector));
            }
            record
        })
        .collect()
}

fn extract_html_records(
    markup: &str,
    list: &ListPageConfig,
    base_url: &str,
    capture_links: bool,
) -> Vec<Record> {
    let document = Html::parse_document(markup);
    let url_selector = list
        .url_selector
        .as_deref()
        .filter(|s| capture_links && !s.is_empty());

    html::select_items(&document, list.item_selector.as_deref())
        .into_iter()
        .map(|item| {
            let mut record = Record::new();
            for field in &list.fields {
                record.insert(
                    &field.name,
                    html::extract_value(item, &field.selector, &field.attribute),
                );
            }
            if let Some(selector) = url_selector {
                record.detail_url =
                    html::first_href(item, selector).map(|href| resolve_url(base_url, &href));
            }
            record
        })
        .collect()
}

/// Extract detail fields from a whole page into a single record.
pub fn extract_detail(page: &Page, fields: &[FieldMapping]) -> Record {
    let mut record = Record::new();
    match page {
        Page::Json(data) => {
            for field in fields {
                record.insert(&field.name, json::extract_value(data, &field.selector));
            }
        }
        Page::Html(markup) => {
            let document = Html::parse_document(markup);
            let root = document.root_element();
            for field in fields {
                record.insert(
                    &field.name,
                    html::extract_value(root, &field.selector, &field.attribute),
                );
            }
        }
    }
    record
}

/// Whether the page advertises another page.
///
/// `None` when no indicator is configured for this kind of page.
pub fn has_next_page(page: &Page, pagination: &PaginationConfig) -> Option<bool> {
    match page {
        Page::Html(markup) => {
            let selector = pagination.next_selector.as_deref()?;
            let document = Html::parse_document(markup);
            Some(html::has_active_element(&document, selector))
        }
        Page::Json(data) => {
            let path = pagination.has_more_path.as_deref()?;
            Some(json::truthy(json::extract_path(data, path)))
        }
    }
}
