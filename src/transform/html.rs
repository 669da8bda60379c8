// src/transform/html.rs
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
static NOISE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, noscript, template").expect("static selector")
});

/// Keep only the `<body>` element, minus scripts, styles and templates.
///
/// The HTML parser never fails; missing structure is synthesized, so an input
/// without a body yields an empty `<body></body>`.
pub fn extract_body(raw: &str) -> String {
    let mut doc = Html::parse_document(raw);

    let noise: Vec<_> = doc.select(&NOISE).map(|el| el.id()).collect();
    for id in noise {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    doc.select(&BODY)
        .next()
        .map(|body| body.html())
        .unwrap_or_default()
}
