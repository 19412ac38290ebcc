//! Removal of executable markup from fetched documents.
use std::sync::LazyLock;

use ammonia::Builder;
use scraper::{Html, Selector};

static HEAD_KEEP: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("head > title, head > meta, head > base, head > link[rel=\"canonical\"]")
        .expect("static head selector")
});
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static body selector"));

/// Structural tags kept on top of ammonia's default allow-list.
const EXTRA_TAGS: &[&str] = &[
    "section", "main", "picture", "source", "video", "audio", "track",
];

fn policy() -> Builder<'static> {
    let mut builder = Builder::default();
    builder
        .add_tags(EXTRA_TAGS)
        .add_generic_attributes(&["class", "id", "lang", "dir"])
        .add_tag_attributes("img", &["srcset", "sizes", "data-src", "loading"])
        .add_tag_attributes("video", &["src", "poster", "controls"])
        .add_tag_attributes("audio", &["src", "controls"])
        .add_tag_attributes("source", &["src", "srcset", "type", "media"])
        .add_tag_attributes("track", &["src", "kind", "label", "srclang"])
        .add_tag_attributes("td", &["colspan", "rowspan"])
        .add_tag_attributes("th", &["colspan", "rowspan"])
        .add_tag_attributes("ol", &["start"])
        .link_rel(None);
    builder
}

/// Sanitize an HTML fragment: scripts, styles, inline event handlers and
/// `javascript:` URLs are dropped, every other element keeps its text.
pub fn sanitize_fragment(html: &str) -> String {
    policy().clean(html).to_string()
}

/// Produce a new document whose body is sanitized and whose head only keeps
/// the metadata the extractors read (`title`, `meta`, `base`, canonical link).
pub fn sanitize_document(html: &str) -> String {
    let document = Html::parse_document(html);

    let head: String = document
        .select(&HEAD_KEEP)
        .map(|element| element.html())
        .collect();
    let body = document
        .select(&BODY)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_default();

    let lang = document
        .root_element()
        .value()
        .attr("lang")
        .map(|lang| format!(" lang=\"{}\"", escape_attr(lang)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html><html{lang}><head>{head}</head><body>{}</body></html>",
        sanitize_fragment(&body)
    )
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_handlers_are_removed() {
        let dirty = r#"<p onclick="steal()">Hello<script>alert(1)</script> <a href="javascript:x()">there</a></p>"#;
        let clean = sanitize_fragment(dirty);
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("javascript:"));
        assert!(clean.contains("Hello"));
        assert!(clean.contains("there"));
    }

    #[test]
    fn style_content_is_dropped_but_structure_kept() {
        let dirty = "<section class=\"post\"><style>p{}</style><h2>T</h2><p>x</p></section>";
        let clean = sanitize_fragment(dirty);
        assert!(!clean.contains("p{}"));
        assert!(clean.contains("<section class=\"post\">"));
        assert!(clean.contains("<h2>T</h2>"));
    }

    #[test]
    fn unknown_tags_are_unwrapped_not_emptied() {
        let clean = sanitize_fragment("<custom-widget>inner words</custom-widget>");
        assert_eq!(clean, "inner words");
    }

    #[test]
    fn document_keeps_head_metadata_and_cleans_body() {
        let html = r#"<html lang="en"><head><title>T</title><script>x()</script>
            <meta property="og:title" content="OG"></head>
            <body><p>Body</p><script>evil()</script></body></html>"#;
        let clean = sanitize_document(html);
        assert!(clean.contains("<title>T</title>"));
        assert!(clean.contains("og:title"));
        assert!(clean.contains("<p>Body</p>"));
        assert!(!clean.contains("evil"));
        assert!(!clean.contains("x()"));
        assert!(clean.contains("lang=\"en\""));
    }
}
