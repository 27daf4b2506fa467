//! Field extraction from parsed markup.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::Attribute;

/// Parse a selector, logging and returning None when it is invalid.
pub fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("Invalid selector {:?}: {}", selector, e);
            None
        }
    }
}

/// Read one field from `element`. An empty selector reads the element itself.
/// Misses and invalid selectors give "".
pub fn extract_value(element: ElementRef<'_>, selector: &str, attribute: &Attribute) -> String {
    let target = if selector.is_empty() {
        Some(element)
    } else {
        parse_selector(selector).and_then(|sel| element.select(&sel).next())
    };

    match target {
        Some(el) => read_attribute(el, attribute),
        None => String::new(),
    }
}

fn read_attribute(element: ElementRef<'_>, attribute: &Attribute) -> String {
    match attribute {
        Attribute::Text => element.text().collect::<String>().trim().to_string(),
        Attribute::Html => element.html(),
        Attribute::Named(name) => element.value().attr(name).unwrap_or_default().to_string(),
    }
}

/// Elements matching `item_selector`, or the document root when unset.
pub fn select_items<'a>(document: &'a Html, item_selector: Option<&str>) -> Vec<ElementRef<'a>> {
    match item_selector.filter(|s| !s.is_empty()) {
        Some(selector) => match parse_selector(selector) {
            Some(sel) => document.select(&sel).collect(),
            None => Vec::new(),
        },
        None => vec![document.root_element()],
    }
}

/// `href` of the first element matching `selector` inside `element`.
pub fn first_href(element: ElementRef<'_>, selector: &str) -> Option<String> {
    let sel = parse_selector(selector)?;
    element
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(String::from)
}

/// Whether an active (not disabled) element matches `selector`.
pub fn has_active_element(document: &Html, selector: &str) -> bool {
    let Some(sel) = parse_selector(selector) else {
        return false;
    };
    document
        .select(&sel)
        .next()
        .is_some_and(|el| el.value().attr("disabled").is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"
        <div class="item" data-id="7">
            <a class="name" href="/p/7"> Widget <em>Pro</em> </a>
            <span class="price">  9.99 </span>
        </div>
    "#;

    fn with_item<T>(f: impl FnOnce(ElementRef<'_>) -> T) -> T {
        let doc = Html::parse_fragment(ITEM);
        let sel = Selector::parse(".item").unwrap();
        let item = doc.select(&sel).next().unwrap();
        f(item)
    }

    #[test]
    fn test_text_is_trimmed() {
        with_item(|item| {
            assert_eq!(extract_value(item, ".price", &Attribute::Text), "9.99");
            assert_eq!(extract_value(item, ".name", &Attribute::Text), "Widget Pro");
        });
    }

    #[test]
    fn test_attribute_and_html() {
        with_item(|item| {
            assert_eq!(
                extract_value(item, ".name", &Attribute::Named("href".into())),
                "/p/7"
            );
            assert_eq!(
                extract_value(item, ".name", &Attribute::Named("title".into())),
                ""
            );
            assert!(extract_value(item, ".price", &Attribute::Html).starts_with("<span"));
            assert_eq!(
                extract_value(item, "", &Attribute::Named("data-id".into())),
                "7"
            );
        });
    }

    #[test]
    fn test_misses_are_empty() {
        with_item(|item| {
            assert_eq!(extract_value(item, ".absent", &Attribute::Text), "");
            assert_eq!(extract_value(item, "[[[", &Attribute::Text), "");
        });
    }

    #[test]
    fn test_next_indicator_respects_disabled() {
        let doc = Html::parse_document(r#"<a class="next" disabled>next</a>"#);
        assert!(!has_active_element(&doc, ".next"));
        let doc = Html::parse_document(r#"<a class="next" href="?page=2">next</a>"#);
        assert!(has_active_element(&doc, ".next"));
        assert!(!has_active_element(&doc, ".missing"));
    }
}
