use std::sync::OnceLock;

use scraper::{Html, Selector};

fn anchor_selector() -> &'static Selector {
    static ANCHOR: OnceLock<Selector> = OnceLock::new();
    ANCHOR.get_or_init(|| Selector::parse("a").expect("static selector is valid"))
}

/// Parses `body` as an HTML document and returns the `href` value of every
/// anchor element, in document order (depth-first over the parse tree).
///
/// The parser is error-recovering, so malformed markup yields whatever tree
/// could be salvaged rather than an error. Anchors without an `href`
/// attribute are skipped.
pub fn anchor_hrefs(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    document
        .select(anchor_selector())
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::to_owned)
        .collect()
}
