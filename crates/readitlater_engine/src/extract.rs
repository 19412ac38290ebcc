use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ego_tree::{NodeId, NodeRef};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::sanitize::escape_attr;

/// Paragraph-like nodes shorter than this do not contribute to scoring.
const MIN_PARAGRAPH_LEN: usize = 25;
/// Ancestors of a scored paragraph that receive a share of its score.
const SCORED_ANCESTORS: usize = 5;
const READERABLE_MIN_LEN: usize = 140;
const READERABLE_MIN_SCORE: f64 = 20.0;

macro_rules! static_selector {
    ($name:ident, $css:literal) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect(concat!("static selector ", $css)));
    };
}

static_selector!(SCORABLE, "p, pre, td, div");
static_selector!(READERABLE_NODES, "p, pre, article");
static_selector!(BR_IN_DIV, "div > br");
static_selector!(LINKS, "a");
static_selector!(BODY, "body");
static_selector!(TITLE, "title");
static_selector!(H1, "h1");
static_selector!(
    META_TITLE,
    r#"meta[property="og:title"], meta[name="twitter:title"]"#
);
static_selector!(
    META_AUTHOR,
    r#"meta[name="author"], meta[property="article:author"]"#
);
static_selector!(BYLINE, r#"[itemprop="author"], [rel="author"]"#);
static_selector!(META_SITE_NAME, r#"meta[property="og:site_name"]"#);
static_selector!(META, "meta");

static UNLIKELY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote")
        .expect("static unlikely regex")
});
static MAYBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)and|article|body|column|content|main|shadow").expect("static maybe regex")
});
static POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story")
        .expect("static positive regex")
});
static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|footer|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|widget")
        .expect("static negative regex")
});

/// Elements dropped from extracted content together with their subtree.
const PRUNED_TAGS: &[&str] = &[
    "nav", "aside", "footer", "form", "button", "input", "select", "textarea", "iframe",
    "object", "embed", "script", "style", "noscript", "template", "dialog",
];
/// Children that keep a `div` from being scored as a paragraph.
const DIV_BLOCK_CHILDREN: &[&str] = &[
    "blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul", "section", "article",
];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Result of a successful extraction. `title` may be empty; callers pick the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub content_html: String,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub word_count: usize,
}

pub trait Extractor: Send + Sync {
    /// Cheap advisory check: does the page look like a single readable article?
    fn is_probably_readerable(&self, html: &str) -> bool;

    /// Pull the main content out of a (sanitized) document, or `None` when the
    /// page has no article-like content at all.
    fn extract(&self, html: &str) -> Option<ExtractedArticle>;
}

/// Content-density scorer in the spirit of Mozilla Readability:
/// paragraphs score their ancestors, the best ancestor (penalized by link
/// density) becomes the article root, and related siblings are appended.
/// Navigation, forms and elements with boilerplate class names are pruned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityExtractor;

impl Extractor for ReadabilityExtractor {
    fn is_probably_readerable(&self, html: &str) -> bool {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let candidates = doc
            .select(&READERABLE_NODES)
            .chain(doc.select(&BR_IN_DIV).filter_map(parent_element));

        let mut score = 0.0;
        for element in candidates {
            if !seen.insert(element.id()) || is_unlikely(element) || is_inside(element, "li") {
                continue;
            }
            let len = text_len(element);
            if len < READERABLE_MIN_LEN {
                continue;
            }
            score += ((len - READERABLE_MIN_LEN) as f64).sqrt();
            if score > READERABLE_MIN_SCORE {
                return true;
            }
        }
        false
    }

    fn extract(&self, html: &str) -> Option<ExtractedArticle> {
        let doc = Html::parse_document(html);
        let body = doc.select(&BODY).next().unwrap_or_else(|| doc.root_element());

        let scores = score_paragraphs(&doc);
        let top = scores
            .iter()
            .filter_map(|(id, score)| {
                let element = doc.tree.get(*id).and_then(ElementRef::wrap)?;
                Some((element, score * (1.0 - link_density(element))))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let mut content = String::new();
        let mut stats = ContentStats::default();
        match top {
            Some((element, top_score)) if element.id() != body.id() => {
                content.push_str("<div>");
                for part in with_related_siblings(element, top_score, &scores) {
                    serialize_filtered(*part, &mut content, &mut stats, part.id() == element.id());
                }
                content.push_str("</div>");
            }
            _ => {
                content.push_str("<div>");
                for child in body.children() {
                    serialize_filtered(child, &mut content, &mut stats, false);
                }
                content.push_str("</div>");
            }
        }

        if stats.text_len == 0 && stats.media == 0 {
            return None;
        }

        Some(ExtractedArticle {
            title: extract_title(&doc),
            content_html: content,
            byline: extract_byline(&doc),
            site_name: meta_content(&doc, &META_SITE_NAME),
            word_count: stats.words,
        })
    }
}

fn score_paragraphs(doc: &Html) -> HashMap<NodeId, f64> {
    let mut scores: HashMap<NodeId, f64> = HashMap::new();
    for element in doc.select(&SCORABLE) {
        if element.value().name() == "div" && has_block_children(element) {
            continue;
        }
        if is_pruned(element) || has_pruned_ancestor(element) {
            continue;
        }
        let text = normalized_text(element);
        let len = text.chars().count();
        if len < MIN_PARAGRAPH_LEN {
            continue;
        }
        let commas = text.matches([',', '\u{ff0c}']).count();
        let score = 1.0 + commas as f64 + (len / 100).min(3) as f64;

        let ancestors = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|ancestor| ancestor.value().name() != "html")
            .take(SCORED_ANCESTORS);
        for (level, ancestor) in ancestors.enumerate() {
            let divider = match level {
                0 => 1.0,
                1 => 2.0,
                n => n as f64 * 3.0,
            };
            *scores
                .entry(ancestor.id())
                .or_insert_with(|| initial_score(ancestor)) += score / divider;
        }
    }
    scores
}

fn with_related_siblings<'a>(
    top: ElementRef<'a>,
    top_score: f64,
    scores: &HashMap<NodeId, f64>,
) -> Vec<ElementRef<'a>> {
    let Some(parent) = parent_element(top) else {
        return vec![top];
    };
    let threshold = (top_score * 0.2).max(10.0);
    let top_class = top.value().attr("class").unwrap_or("");

    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| {
            if sibling.id() == top.id() {
                return true;
            }
            if is_pruned(*sibling) {
                return false;
            }
            let bonus = match sibling.value().attr("class") {
                Some(class) if !class.is_empty() && class == top_class => top_score * 0.2,
                _ => 0.0,
            };
            if scores.get(&sibling.id()).is_some_and(|score| score + bonus >= threshold) {
                return true;
            }
            if sibling.value().name() != "p" {
                return false;
            }
            let text = normalized_text(*sibling);
            let len = text.chars().count();
            let density = link_density(*sibling);
            (len > 80 && density < 0.25)
                || (len > 0 && len <= 80 && density == 0.0 && (text.ends_with('.') || text.contains(". ")))
        })
        .collect()
}

fn initial_score(element: ElementRef) -> f64 {
    let base = match element.value().name() {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    base + class_weight(element)
}

fn class_weight(element: ElementRef) -> f64 {
    let mut weight = 0.0;
    for value in [element.value().attr("class"), element.value().attr("id")]
        .into_iter()
        .flatten()
        .filter(|value| !value.is_empty())
    {
        if NEGATIVE.is_match(value) {
            weight -= 25.0;
        }
        if POSITIVE.is_match(value) {
            weight += 25.0;
        }
    }
    weight
}

fn is_unlikely(element: ElementRef) -> bool {
    if matches!(element.value().name(), "body" | "a" | "article" | "main") {
        return false;
    }
    let signature = format!(
        "{} {}",
        element.value().attr("class").unwrap_or(""),
        element.value().attr("id").unwrap_or("")
    );
    UNLIKELY.is_match(&signature) && !MAYBE.is_match(&signature)
}

fn is_pruned(element: ElementRef) -> bool {
    PRUNED_TAGS.contains(&element.value().name()) || is_unlikely(element)
}

fn has_pruned_ancestor(element: ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| ancestor.value().name() != "body")
        .any(is_pruned)
}

fn has_block_children(element: ElementRef) -> bool {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .any(|child| DIV_BLOCK_CHILDREN.contains(&child.value().name()))
}

fn is_inside(element: ElementRef, tag: &str) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == tag)
}

fn parent_element(element: ElementRef) -> Option<ElementRef> {
    element.parent().and_then(ElementRef::wrap)
}

fn normalized_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_len(element: ElementRef) -> usize {
    normalized_text(element).chars().count()
}

fn link_density(element: ElementRef) -> f64 {
    let total = text_len(element);
    if total == 0 {
        return 0.0;
    }
    let linked: usize = element.select(&LINKS).map(text_len).sum();
    linked as f64 / total as f64
}

#[derive(Debug, Default)]
struct ContentStats {
    text_len: usize,
    words: usize,
    media: usize,
}

/// Re-serialize a subtree, dropping pruned elements. `keep_root` protects the
/// chosen article root from the class-name heuristics.
fn serialize_filtered(node: NodeRef<Node>, out: &mut String, stats: &mut ContentStats, keep_root: bool) {
    match node.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            stats.text_len += trimmed.chars().count();
            stats.words += trimmed.split_whitespace().count();
            out.push_str(&escape_text(text));
        }
        Node::Element(element) => {
            let Some(element_ref) = ElementRef::wrap(node) else {
                return;
            };
            if !keep_root && is_pruned(element_ref) {
                return;
            }
            let name = element.name();
            if matches!(name, "img" | "video" | "audio") {
                stats.media += 1;
            }
            out.push('<');
            out.push_str(name);
            for (key, value) in element.attrs() {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_TAGS.contains(&name) {
                return;
            }
            for child in node.children() {
                serialize_filtered(child, out, stats, false);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {}
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

/// `content` of the first non-empty `<meta>` whose `property`, `name` or
/// `itemprop` is `key`.
pub(crate) fn meta_by_key(doc: &Html, key: &str) -> Option<String> {
    doc.select(&META)
        .filter(|meta| {
            let value = meta.value();
            [value.attr("property"), value.attr("name"), value.attr("itemprop")].contains(&Some(key))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

fn extract_title(doc: &Html) -> String {
    if let Some(title) = meta_content(doc, &META_TITLE) {
        return title;
    }
    let document_title = doc
        .select(&TITLE)
        .next()
        .map(normalized_text)
        .unwrap_or_default();
    if !document_title.is_empty() {
        return strip_site_suffix(&document_title);
    }
    doc.select(&H1).next().map(normalized_text).unwrap_or_default()
}

/// "Article headline | Site" -> "Article headline", unless that leaves
/// fewer than three words.
fn strip_site_suffix(title: &str) -> String {
    const SEPARATORS: &[&str] = &[" | ", " - ", " \u{2013} ", " \u{2014} ", " \u{bb} ", " :: ", " / "];
    let cut = SEPARATORS
        .iter()
        .filter_map(|separator| title.rfind(separator))
        .max();
    match cut {
        Some(index) if title[..index].split_whitespace().count() >= 3 => title[..index].trim().to_string(),
        _ => title.to_string(),
    }
}

fn extract_byline(doc: &Html) -> Option<String> {
    meta_content(doc, &META_AUTHOR)
        .filter(|author| !author.starts_with("http"))
        .or_else(|| {
            doc.select(&BYLINE)
                .map(normalized_text)
                .find(|text| !text.is_empty() && text.chars().count() < 100)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn long_paragraph(seed: &str) -> String {
        format!(
            "<p>{}</p>",
            std::iter::repeat(format!("{seed} sentence, with commas, and enough words to count."))
                .take(6)
                .collect::<Vec<_>>()
                .join(" ")
        )
    }

    #[test]
    fn picks_article_body_over_navigation() {
        let html = format!(
            r#"<html><head><title>Long enough headline here | Site</title></head><body>
            <nav><a href="/">Home</a><a href="/a">About</a></nav>
            <div class="sidebar"><p>{}</p></div>
            <div class="post-content">{}{}</div>
            <footer>Copyright</footer></body></html>"#,
            "Sidebar filler text that should never appear in the article output at all.",
            long_paragraph("First"),
            long_paragraph("Second"),
        );
        let article = ReadabilityExtractor.extract(&html).expect("article");
        assert_eq!(article.title, "Long enough headline here");
        assert!(article.content_html.contains("First sentence"));
        assert!(article.content_html.contains("Second sentence"));
        assert!(!article.content_html.contains("Sidebar filler"));
        assert!(!article.content_html.contains("Home"));
        assert!(!article.content_html.contains("Copyright"));
    }

    #[test]
    fn tiny_page_falls_back_to_body() {
        let html = "<html><head><title>Hello</title></head><body><p>World</p></body></html>";
        let article = ReadabilityExtractor.extract(html).expect("article");
        assert_eq!(article.title, "Hello");
        assert!(article.content_html.contains("<p>World</p>"));
        assert_eq!(article.word_count, 1);
    }

    #[test]
    fn empty_body_yields_none() {
        let html = "<html><head><title>Nothing</title></head><body><nav><a href=\"/\">x</a></nav></body></html>";
        assert_eq!(ReadabilityExtractor.extract(html), None);
    }

    #[test]
    fn og_title_and_metadata_are_preferred() {
        let html = r#"<html><head><title>Fallback</title>
            <meta property="og:title" content="Open Graph Title">
            <meta name="author" content="Ada">
            <meta property="og:site_name" content="Example News"></head>
            <body><p>Some text.</p></body></html>"#;
        let article = ReadabilityExtractor.extract(html).expect("article");
        assert_eq!(article.title, "Open Graph Title");
        assert_eq!(article.byline.as_deref(), Some("Ada"));
        assert_eq!(article.site_name.as_deref(), Some("Example News"));
    }

    #[test]
    fn short_titles_keep_their_suffix() {
        assert_eq!(strip_site_suffix("Rust | Blog"), "Rust | Blog");
        assert_eq!(strip_site_suffix("A much longer title - Blog"), "A much longer title");
    }

    #[test]
    fn readerable_needs_substantial_paragraphs() {
        let short = "<html><body><p>Too short.</p></body></html>";
        assert!(!ReadabilityExtractor.is_probably_readerable(short));

        let long = format!(
            "<html><body><article>{}{}{}</article></body></html>",
            long_paragraph("One"),
            long_paragraph("Two"),
            long_paragraph("Three")
        );
        assert!(ReadabilityExtractor.is_probably_readerable(&long));
    }

    #[test]
    fn images_count_as_content() {
        let html = r#"<html><body><div><img src="/a.png" alt="A"></div></body></html>"#;
        let article = ReadabilityExtractor.extract(html).expect("article");
        assert!(article.content_html.contains("src=\"/a.png\""));
    }
}
