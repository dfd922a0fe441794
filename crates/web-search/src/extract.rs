//! Text extraction from HTML.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
];

/// Wide enough that html2text never wraps a sentence.
const TEXT_WIDTH: usize = 10_000;

/// Tried in order when looking for the main content of a page.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    ".post",
    ".entry",
    "[role=\"main\"]",
    ".main-content",
    "#content",
];

/// Visible text of a whole page with boilerplate removed and whitespace
/// collapsed to single spaces.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    collapse_whitespace(&out)
}

/// Text of the page's main content area, falling back to `<body>`.
pub fn main_content_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let element = MAIN_CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|s| document.select(&s).next())
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|s| document.select(&s).next())
        });

    let Some(element) = element else {
        return String::new();
    };

    let text = html2text::from_read(element.html().as_bytes(), TEXT_WIDTH).unwrap_or_default();
    collapse_whitespace(&text)
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            if !SKIPPED_ELEMENTS.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
