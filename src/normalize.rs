//! Markup normalization
//!
//! Callers hand over anything from a full HTML document to a bare
//! fragment pasted out of an email editor. Before the markup reaches the
//! browser it is normalized into a minimal well-formed document: a single
//! `<html>` root, a `<head>`, a responsive viewport meta tag, and a
//! `<title>` derived from the device-kind label. Existing elements are
//! never duplicated.
//!
//! This is a pure string transformation with no engine dependency, so it
//! stays testable without a browser.

use crate::DeviceKind;

const VIEWPORT_META: &str =
    r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#;

/// Normalize `markup` into a minimal, complete HTML document.
pub fn normalize_markup(markup: &str, device_kind: DeviceKind) -> String {
    let mut doc = if has_tag(markup, "html") {
        markup.to_string()
    } else {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n</head>\n<body>\n{markup}\n</body>\n</html>"
        )
    };

    if !has_tag(&doc, "head") {
        doc = insert_after_open_tag(&doc, "html", "<head></head>");
    }
    if !has_viewport_meta(&doc) {
        doc = insert_after_open_tag(&doc, "head", VIEWPORT_META);
    }
    if !has_tag(&doc, "title") {
        let title = format!("<title>{} view</title>", device_kind.label());
        doc = insert_after_open_tag(&doc, "head", &title);
    }

    doc
}

/// Case-insensitive scan for an opening `<tag>` with a proper name boundary,
/// so `<header>` does not count as `<head>`.
fn has_tag(markup: &str, tag: &str) -> bool {
    find_open_tag(markup, tag).is_some()
}

/// Byte offset of the first `<tag` occurrence, or `None`.
fn find_open_tag(markup: &str, tag: &str) -> Option<usize> {
    let bytes = markup.as_bytes();
    let tag = tag.as_bytes();
    let mut i = 0;
    while i + tag.len() + 1 <= bytes.len() {
        if bytes[i] == b'<' {
            let rest = &bytes[i + 1..];
            if rest.len() >= tag.len()
                && rest[..tag.len()].eq_ignore_ascii_case(tag)
            {
                let boundary = rest.get(tag.len()).copied();
                let is_name_end = match boundary {
                    None => true,
                    Some(c) => !(c.is_ascii_alphanumeric() || c == b'-'),
                };
                if is_name_end {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn has_viewport_meta(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();
    ["name=\"viewport\"", "name='viewport'", "name=viewport"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Insert `content` immediately after the first opening `<tag ...>` in
/// `markup`. When the tag (or its closing `>`) cannot be found, the content
/// is prepended instead so it is never silently dropped.
fn insert_after_open_tag(markup: &str, tag: &str, content: &str) -> String {
    let insert_at = find_open_tag(markup, tag)
        .and_then(|start| markup[start..].find('>').map(|end| start + end + 1));

    match insert_at {
        Some(at) => format!("{}{}{}", &markup[..at], content, &markup[at..]),
        None => format!("{content}{markup}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn count_occurrences(haystack: &str, needle: &str) -> usize {
        let lower = haystack.to_ascii_lowercase();
        lower.matches(needle).count()
    }

    #[test]
    fn bare_fragment_is_wrapped() {
        let doc = normalize_markup("<p>Hello</p>", DeviceKind::Desktop);
        assert_eq!(count_occurrences(&doc, "<html"), 1);
        assert_eq!(count_occurrences(&doc, "<head"), 1);
        assert!(doc.contains("<p>Hello</p>"));
        assert!(doc.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn viewport_meta_is_added_exactly_once() {
        let doc = normalize_markup("<p>Hello</p>", DeviceKind::Desktop);
        let parsed = Html::parse_document(&doc);
        let meta = Selector::parse(r#"meta[name="viewport"]"#).unwrap();
        assert_eq!(parsed.select(&meta).count(), 1);
    }

    #[test]
    fn existing_viewport_meta_is_not_duplicated() {
        let input = r#"<html><head><meta name="viewport" content="width=300"></head><body>x</body></html>"#;
        let doc = normalize_markup(input, DeviceKind::Desktop);
        let parsed = Html::parse_document(&doc);
        let meta = Selector::parse(r#"meta[name="viewport"]"#).unwrap();
        assert_eq!(parsed.select(&meta).count(), 1);
        assert!(doc.contains("width=300"));
    }

    #[test]
    fn title_derives_from_device_kind() {
        let doc = normalize_markup("<p>x</p>", DeviceKind::Mobile);
        let parsed = Html::parse_document(&doc);
        let title = Selector::parse("title").unwrap();
        let titles: Vec<_> = parsed.select(&title).collect();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].inner_html(), "mobile view");
    }

    #[test]
    fn existing_title_is_kept() {
        let input = "<html><head><title>Mine</title></head><body>x</body></html>";
        let doc = normalize_markup(input, DeviceKind::Desktop);
        let parsed = Html::parse_document(&doc);
        let title = Selector::parse("title").unwrap();
        let titles: Vec<_> = parsed.select(&title).collect();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].inner_html(), "Mine");
    }

    #[test]
    fn document_without_head_gets_one() {
        let input = "<html><body><p>x</p></body></html>";
        let doc = normalize_markup(input, DeviceKind::Desktop);
        assert_eq!(count_occurrences(&doc, "<head"), 1);
        // inserted right after the opening <html> tag
        assert!(doc.find("<head").unwrap() > doc.find("<html").unwrap());
        assert!(doc.find("<head").unwrap() < doc.find("<body").unwrap());
    }

    #[test]
    fn header_element_does_not_count_as_head() {
        let input = "<html><header>top</header><body>x</body></html>";
        let doc = normalize_markup(input, DeviceKind::Desktop);
        assert_eq!(count_occurrences(&doc, "<head>"), 1);
    }

    #[test]
    fn uppercase_root_is_recognized() {
        let input = "<HTML><HEAD></HEAD><BODY>x</BODY></HTML>";
        let doc = normalize_markup(input, DeviceKind::Desktop);
        assert_eq!(count_occurrences(&doc, "<html"), 1);
        assert_eq!(count_occurrences(&doc, "<head"), 1);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_markup("<p>Hello</p>", DeviceKind::Custom);
        let twice = normalize_markup(&once, DeviceKind::Custom);
        assert_eq!(once, twice);
    }
}
