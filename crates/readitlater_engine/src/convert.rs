use std::collections::{HashMap, HashSet};

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::assets::AssetManager;
use crate::PipelineError;

/// Convert extracted HTML into note markdown.
///
/// Media references are collected first, resolved through `assets` (which may
/// download them concurrently), and the markdown is assembled once every
/// rewrite is known.
pub async fn html_to_markdown(
    html: &str,
    base: Option<&Url>,
    assets: &mut AssetManager<'_>,
) -> Result<String, PipelineError> {
    let sources = collect_media(html, base);
    let rewrites = assets.resolve_all(&sources).await?;
    Ok(MarkdownRenderer::new(base, &rewrites).render(html))
}

/// Absolute http(s) URLs of every image, video and audio source in document
/// order, without duplicates.
pub fn collect_media(html: &str, base: Option<&Url>) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut seen = HashSet::new();
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|element| media_source(element, base))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn media_source(element: ElementRef, base: Option<&Url>) -> Option<String> {
    let value = element.value();
    let raw = match value.name() {
        "img" => value
            .attr("src")
            .filter(|src| !src.trim().is_empty() && !src.trim_start().starts_with("data:"))
            .or_else(|| value.attr("data-src"))
            .or_else(|| value.attr("srcset").and_then(first_srcset_candidate)),
        "video" | "audio" => value.attr("src").or_else(|| {
            element
                .children()
                .filter_map(ElementRef::wrap)
                .find(|child| child.value().name() == "source")
                .and_then(|source| source.value().attr("src"))
        }),
        _ => None,
    }?;
    let url = resolve_url(raw, base)?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .next()
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}

/// Markdown link target; angle brackets keep spaces and parentheses intact.
pub(crate) fn link_target(target: &str) -> String {
    if target.contains([' ', '(', ')']) {
        format!("<{target}>")
    } else {
        target.to_string()
    }
}

pub struct MarkdownRenderer<'a> {
    base: Option<&'a Url>,
    rewrites: &'a HashMap<String, String>,
}

impl<'a> MarkdownRenderer<'a> {
    /// `rewrites` maps absolute media URLs to the reference written into the note.
    pub fn new(base: Option<&'a Url>, rewrites: &'a HashMap<String, String>) -> Self {
        Self { base, rewrites }
    }

    pub fn render(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut writer = MarkdownWriter::default();
        self.visit_children(fragment.root_element(), &mut writer);
        writer.finish()
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, w: &mut MarkdownWriter) {
        match node.value() {
            Node::Text(text) => w.push_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, w);
                }
            }
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.visit_node(child, w);
                }
            }
            _ => {}
        }
    }

    fn visit_children(&self, element: ElementRef, w: &mut MarkdownWriter) {
        for child in element.children() {
            self.visit_node(child, w);
        }
    }

    fn visit_element(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let tag = element.value().name().to_ascii_lowercase();
        match tag.as_str() {
            "script" | "style" | "noscript" | "template" | "head" | "title" | "meta" | "link" => {}
            "br" => w.line_break(),
            "hr" => {
                w.blank_line();
                w.push_raw("---");
                w.blank_line();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(tag.as_bytes()[1] - b'0');
                let inner = self.inline(element);
                if inner.is_empty() {
                    return;
                }
                w.blank_line();
                w.push_raw(&"#".repeat(level));
                w.push_raw(" ");
                w.push_raw(&inner);
                w.blank_line();
            }
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
            | "aside" | "figure" | "figcaption" | "address" | "details" | "summary" | "center"
            | "dl" | "dt" | "dd" | "fieldset" => {
                w.blank_line();
                self.visit_children(element, w);
                w.blank_line();
            }
            "blockquote" => self.blockquote(element, w),
            "ul" => self.list(element, false, w),
            "ol" => self.list(element, true, w),
            "pre" => self.code_block(element, w),
            "table" => self.table(element, w),
            "strong" | "b" => self.emphasis(element, "**", w),
            "em" | "i" | "cite" | "dfn" => self.emphasis(element, "*", w),
            "del" | "s" | "strike" => self.emphasis(element, "~~", w),
            "mark" => self.emphasis(element, "==", w),
            "code" | "kbd" | "samp" | "tt" => self.inline_code(element, w),
            "a" => self.anchor(element, w),
            "img" => self.image(element, w),
            "video" | "audio" => self.embed(element, w),
            // Unknown markup degrades to its content.
            _ => self.visit_children(element, w),
        }
    }

    /// Render children onto a single line.
    fn inline(&self, element: ElementRef) -> String {
        let mut sub = MarkdownWriter::default();
        self.visit_children(element, &mut sub);
        sub.finish()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn block(&self, element: ElementRef) -> String {
        let mut sub = MarkdownWriter::default();
        self.visit_children(element, &mut sub);
        sub.finish()
    }

    fn emphasis(&self, element: ElementRef, marker: &str, w: &mut MarkdownWriter) {
        let inner = self.inline(element);
        if inner.is_empty() {
            self.visit_children(element, w);
            return;
        }
        w.push_inline(element, &format!("{marker}{inner}{marker}"));
    }

    fn inline_code(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let text: String = element.text().collect();
        let code = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if code.is_empty() {
            return;
        }
        let rendered = if code.contains('`') {
            format!("`` {code} ``")
        } else {
            format!("`{code}`")
        };
        w.push_inline(element, &rendered);
    }

    fn anchor(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let inner = self.inline(element);
        if inner.is_empty() {
            return;
        }
        let href = element
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, self.base));
        match href {
            Some(url) => w.push_inline(element, &format!("[{inner}]({})", link_target(url.as_str()))),
            None => w.push_inline(element, &inner),
        }
    }

    fn media_target(&self, element: ElementRef) -> Option<String> {
        let source = media_source(element, self.base)?;
        Some(self.rewrites.get(&source).cloned().unwrap_or(source))
    }

    fn image(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let alt = element
            .value()
            .attr("alt")
            .unwrap_or("")
            .replace(['[', ']'], "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match self.media_target(element) {
            Some(target) => w.push_raw(&format!("![{alt}]({})", link_target(&target))),
            None if !alt.is_empty() => w.push_text(&alt),
            None => {}
        }
    }

    fn embed(&self, element: ElementRef, w: &mut MarkdownWriter) {
        if let Some(target) = self.media_target(element) {
            w.blank_line();
            w.push_raw(&format!("![]({})", link_target(&target)));
            w.blank_line();
        }
    }

    fn blockquote(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let inner = self.block(element);
        if inner.is_empty() {
            return;
        }
        let quoted = inner
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        w.blank_line();
        w.push_raw(&quoted);
        w.blank_line();
    }

    fn list(&self, element: ElementRef, ordered: bool, w: &mut MarkdownWriter) {
        let mut index = if ordered {
            element
                .value()
                .attr("start")
                .and_then(|start| start.trim().parse::<usize>().ok())
                .unwrap_or(1)
        } else {
            1
        };

        w.blank_line();
        for child in element.children() {
            let Some(item) = ElementRef::wrap(child) else {
                if let Node::Text(text) = child.value() {
                    w.push_text(text);
                }
                continue;
            };
            if item.value().name() != "li" {
                self.visit_element(item, w);
                continue;
            }

            let marker = if ordered {
                format!("{index}. ")
            } else {
                "- ".to_string()
            };
            index += 1;
            let indent = " ".repeat(marker.len());

            w.newline();
            w.push_raw(&marker);
            for (i, line) in self.list_item(item).lines().enumerate() {
                if i > 0 {
                    w.push_raw("\n");
                    if !line.is_empty() {
                        w.push_raw(&indent);
                    }
                }
                w.push_raw(line);
            }
        }
        w.blank_line();
    }

    fn list_item(&self, item: ElementRef) -> String {
        let body = self.block(item);
        let loose = item
            .children()
            .filter_map(ElementRef::wrap)
            .any(|child| child.value().name() == "p");
        if loose {
            body
        } else {
            body.lines()
                .filter(|line| !line.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    fn code_block(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let text: String = element.text().collect();
        let code = text.trim_matches('\n');
        let fence = if code.contains("```") { "~~~~" } else { "```" };
        w.blank_line();
        w.push_raw(fence);
        w.push_raw(&code_language(element).unwrap_or_default());
        w.push_raw("\n");
        w.push_raw(code);
        w.push_raw("\n");
        w.push_raw(fence);
        w.blank_line();
    }

    fn table(&self, element: ElementRef, w: &mut MarkdownWriter) {
        let mut rows: Vec<Vec<String>> = element
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|row| row.value().name() == "tr" && nearest_table(*row) == Some(element.id()))
            .map(|row| self.table_row(row))
            .filter(|cells| !cells.is_empty())
            .collect();
        if rows.is_empty() {
            return;
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let mut out = Vec::with_capacity(rows.len() + 2);
        if let Some(caption) = element
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "caption")
        {
            let caption = self.inline(caption);
            if !caption.is_empty() {
                out.push(caption);
                out.push(String::new());
            }
        }
        out.push(format!("| {} |", rows[0].join(" | ")));
        out.push(format!("|{}", " --- |".repeat(width)));
        for row in &rows[1..] {
            out.push(format!("| {} |", row.join(" | ")));
        }

        w.blank_line();
        w.push_raw(&out.join("\n"));
        w.blank_line();
    }

    fn table_row(&self, row: ElementRef) -> Vec<String> {
        let mut cells = Vec::new();
        for cell in row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        {
            cells.push(self.inline(cell).replace('|', "\\|"));
            let span = cell
                .value()
                .attr("colspan")
                .and_then(|span| span.trim().parse::<usize>().ok())
                .unwrap_or(1);
            for _ in 1..span.min(64) {
                cells.push(String::new());
            }
        }
        cells
    }
}

fn nearest_table(row: ElementRef) -> Option<ego_tree::NodeId> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
        .map(|table| table.id())
}

fn code_language(pre: ElementRef) -> Option<String> {
    let code = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "code");
    [Some(pre), code]
        .into_iter()
        .flatten()
        .filter_map(|element| element.value().attr("class"))
        .flat_map(str::split_whitespace)
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
                .map(str::to_string)
        })
}

/// Output buffer that collapses whitespace and keeps block separation tidy.
#[derive(Debug, Default)]
struct MarkdownWriter {
    out: String,
}

impl MarkdownWriter {
    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.out.is_empty() || self.out.ends_with([' ', '\n']) {
                    continue;
                }
                self.out.push(' ');
            } else {
                self.out.push(ch);
            }
        }
    }

    fn push_raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Push an inline token, keeping the element's surrounding whitespace.
    fn push_inline(&mut self, element: ElementRef, rendered: &str) {
        let text: String = element.text().collect();
        if text.starts_with(char::is_whitespace) {
            self.push_text(" ");
        }
        self.push_raw(rendered);
        if text.ends_with(char::is_whitespace) {
            self.push_text(" ");
        }
    }

    fn trim_trailing_spaces(&mut self) {
        let len = self.out.trim_end_matches(' ').len();
        self.out.truncate(len);
    }

    fn newline(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn line_break(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() {
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.trim_trailing_spaces();
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        if self.out.ends_with('\n') {
            self.out.push('\n');
        } else {
            self.out.push_str("\n\n");
        }
    }

    fn finish(self) -> String {
        self.out.trim().to_string()
    }
}
