//! Turn an HTML page into records using a target's selector rules.

use std::collections::BTreeMap;

use scraper::Html;
use tracing::{debug, trace};
use url::Url;

use crate::dedupe::dedupe;
use crate::error::SelectorError;
use crate::record::{Record, SOURCE_FIELD};
use crate::target::Rules;

/// Extract with already compiled rules.
///
/// Every element matched by the item selector becomes a record; fields named
/// `link` or `url` are resolved against `base_url`. Records without any
/// non-empty value are dropped and the rest deduplicated.
pub fn extract_with(html: &str, rules: &Rules, base_url: &str, source: &str) -> Vec<Record> {
    let doc = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let mut records = Vec::new();
    for element in doc.select(&rules.item) {
        let mut record = Record::new();
        for (name, rule) in &rules.fields {
            let mut value = rule.evaluate(element);
            if is_url_field(name) {
                value = value.map(|v| resolve(base.as_ref(), v));
            }
            record.set(name.as_str(), value);
        }

        if !record.has_content() {
            trace!("skipping empty item");
            continue;
        }
        record.set(SOURCE_FIELD, Some(source.to_string()));
        records.push(record);
    }

    let total = records.len();
    let records = dedupe(records);
    debug!("{source}: {} item(s), {} after dedup", total, records.len());
    records
}

/// Compile the selectors then extract; nothing is emitted if any selector is invalid.
pub fn extract(
    html: &str,
    item_selector: &str,
    fields: &BTreeMap<String, String>,
    base_url: &str,
    source: &str,
) -> Result<Vec<Record>, SelectorError> {
    let rules = Rules::compile(item_selector, fields)?;
    Ok(extract_with(html, &rules, base_url, source))
}

fn is_url_field(name: &str) -> bool {
    name.eq_ignore_ascii_case("link") || name.eq_ignore_ascii_case("url")
}

/// RFC 3986 join; the raw value is kept if it cannot be resolved.
fn resolve(base: Option<&Url>, value: String) -> String {
    if value.is_empty() {
        return value;
    }
    match base.map(|b| b.join(&value)) {
        Some(Ok(u)) => u.to_string(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const BASE: &str = "https://example.com";

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const LISTING: &str = r#"
        <html>
            <body>
                <div class="item">
                    <a class="title" href="/item1">Item 1</a>
                </div>
                <div class="item">
                    <a class="title" href="/item2">Item 2</a>
                </div>
            </body>
        </html>
    "#;

    #[test]
    fn test_extract_listing() {
        let f = fields(&[("title", ".title::text"), ("link", ".title::attr(href)")]);
        let res = extract(LISTING, ".item", &f, BASE, "test_site").unwrap();

        assert_eq!(2, res.len());
        assert_eq!(Some("test_site"), res[0].value("source"));
        assert_eq!(Some("Item 1"), res[0].value("title"));
        assert_eq!(Some("https://example.com/item1"), res[0].value("link"));
        assert_eq!(Some("https://example.com/item2"), res[1].value("link"));
    }

    #[rstest]
    #[case("link", "/path", "https://example.com/path")]
    #[case("URL", "/path", "https://example.com/path")]
    #[case("link", "https://other.org/x", "https://other.org/x")]
    #[case("link", "//cdn.example.net/a", "https://cdn.example.net/a")]
    #[case("link", "page?q=1", "https://example.com/page?q=1")]
    #[case("href", "/path", "/path")]
    fn test_url_resolution(#[case] field: &str, #[case] raw: &str, #[case] expected: &str) {
        let html = format!(r#"<ul><li><a href="{raw}">x</a></li></ul>"#);
        let f = fields(&[(field, "a::attr(href)")]);
        let res = extract(&html, "li", &f, BASE, "s").unwrap();
        assert_eq!(Some(expected), res[0].value(field));
    }

    #[test]
    fn test_text_link_is_resolved_too() {
        let html = r#"<ul><li><span class="u">/from-text</span></li></ul>"#;
        let f = fields(&[("url", ".u")]);
        let res = extract(html, "li", &f, BASE, "s").unwrap();
        assert_eq!(Some("https://example.com/from-text"), res[0].value("url"));
    }

    #[test]
    fn test_empty_items_dropped() {
        let html = r#"
            <ul>
              <li><span class="t">One</span></li>
              <li><span class="t"></span></li>
              <li><b>nothing here</b></li>
            </ul>"#;
        let f = fields(&[("title", ".t")]);
        let res = extract(html, "li", &f, BASE, "s").unwrap();
        assert_eq!(1, res.len());
        assert_eq!(Some("One"), res[0].value("title"));
    }

    #[test]
    fn test_missing_field_is_absent() {
        let html = r#"<ul><li><span class="t">One</span></li></ul>"#;
        let f = fields(&[("title", ".t"), ("price", ".price")]);
        let res = extract(html, "li", &f, BASE, "s").unwrap();
        let mut expected = Record::new().with("title", "One").with("source", "s");
        expected.set("price", None);
        assert_eq!(expected, res[0]);
    }

    #[test]
    fn test_duplicates_removed() {
        let html = r#"
            <ul>
              <li><a href="/a">A</a></li>
              <li><a href="/a">A</a></li>
              <li><a href="/b">B</a></li>
            </ul>"#;
        let f = fields(&[("title", "a"), ("link", "a::attr(href)")]);
        let res = extract(html, "li", &f, BASE, "s").unwrap();
        assert_eq!(2, res.len());
    }

    #[test]
    fn test_invalid_selector() {
        let f = fields(&[("title", "span[")]);
        assert!(extract(LISTING, ".item", &f, BASE, "s").is_err());

        let f = fields(&[("title", ".t")]);
        assert!(extract(LISTING, "div..item", &f, BASE, "s").is_err());
    }

    #[test]
    fn test_no_items() {
        let f = fields(&[("title", ".t")]);
        let res = extract("<html></html>", ".item", &f, BASE, "s").unwrap();
        assert!(res.is_empty());
    }
}
