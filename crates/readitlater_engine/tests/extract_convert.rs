use std::collections::HashMap;

use pretty_assertions::assert_eq;
use readitlater_engine::{
    collect_media, decode_text, sanitize_document, Extractor, MarkdownRenderer,
    ReadabilityExtractor,
};
use url::Url;

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn decode_respects_charset_header() {
    let bytes = b"caf\xe9";
    let decoded = decode_text(bytes, Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded.text, "café");
}

#[test]
fn decode_sanitize_extract_convert_is_deterministic() {
    let bytes = br#"<html><head><title>X</title><script>track()</script></head><body><article><p>A</p><p onclick="x()">B</p></article></body></html>"#;
    let decoded = decode_text(bytes, Some("text/html; charset=utf-8"));
    let clean = sanitize_document(&decoded.text);
    let extracted = ReadabilityExtractor.extract(&clean).expect("content");
    assert_eq!(extracted.title, "X");

    let rewrites = HashMap::new();
    let md = MarkdownRenderer::new(None, &rewrites).render(&extracted.content_html);
    assert_eq!(md, "A\n\nB");
}

#[test]
fn conversion_preserves_every_word() {
    let html = r#"
        <h2>Ownership rules</h2>
        <p>Each value has an <strong>owner</strong>; there can only be <em>one</em> owner at a time.</p>
        <blockquote><p>When the owner goes out of scope, the value is dropped.</p></blockquote>
        <ol><li>Move semantics</li><li>Borrowing with <code>&amp;T</code></li></ol>
        <table><tr><th>Kind</th><th>Count</th></tr><tr><td>shared</td><td>many</td></tr></table>
        <p>Read <a href="https://doc.rust-lang.org/book/">the book</a> for details.</p>
    "#;
    let rewrites = HashMap::new();
    let md = MarkdownRenderer::new(None, &rewrites).render(html);

    let expected: Vec<String> = words(&scraper::Html::parse_fragment(html).root_element().text().collect::<String>());
    let rendered = words(&md);
    for word in &expected {
        assert!(rendered.contains(word), "missing {word:?} in {md}");
    }
}

#[test]
fn media_is_collected_relative_to_base() {
    let base = Url::parse("https://blog.example.com/2024/post/").unwrap();
    let html = r#"<p><img src="img/one.png"></p><audio src="/pod.mp3"></audio><img src="mailto:x"><img src="img/one.png">"#;
    assert_eq!(
        collect_media(html, Some(&base)),
        vec![
            "https://blog.example.com/2024/post/img/one.png".to_string(),
            "https://blog.example.com/pod.mp3".to_string(),
        ]
    );
}

#[test]
fn extractor_reports_metadata() {
    let paragraph = "A long enough paragraph, with commas, to make this container the obvious candidate for the article body.";
    let html = format!(
        r#"<html><head><meta property="og:title" content="Real Title"><meta property="og:site_name" content="Site">
        <meta name="author" content="Jane Doe"><title>Other | Site</title></head>
        <body><div class="sidebar"><p>{paragraph}</p></div><div class="content"><p>{paragraph}</p><p>{paragraph}</p></div></body></html>"#
    );
    let article = ReadabilityExtractor.extract(&html).expect("article");
    assert_eq!(article.title, "Real Title");
    assert_eq!(article.site_name.as_deref(), Some("Site"));
    assert_eq!(article.byline.as_deref(), Some("Jane Doe"));
    assert!(!article.content_html.contains("sidebar"));
    assert!(article.word_count >= 30);
}
