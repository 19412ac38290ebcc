use readitlater_logging::engine_warn;
use scraper::{Html, Selector};
use url::Url;

use crate::convert::html_to_markdown;
use crate::extract::{Extractor, ReadabilityExtractor};
use crate::parsers::{title_or_default, ParseContext, Parser};
use crate::sanitize::sanitize_document;
use crate::template::RenderContext;
use crate::{FailureKind, Input, Note, Notice, PipelineError, Stage};

const WORDS_PER_MINUTE: usize = 200;

/// Generic article extraction for any http(s) URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebsiteParser;

#[async_trait::async_trait]
impl Parser for WebsiteParser {
    fn name(&self) -> &'static str {
        "website"
    }

    fn test(&self, input: &Input) -> bool {
        input
            .url()
            .is_some_and(|url| matches!(url.scheme(), "http" | "https"))
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let article_url = input.as_str().trim();
        let (html, metadata) = match ctx.fetch_document(article_url).await {
            Ok(fetched) => fetched,
            // PDFs, images and the like: keep the link.
            Err(PipelineError::Fetch(err))
                if matches!(err.kind, FailureKind::UnsupportedContentType { .. }) =>
            {
                return Ok(ctx.not_parsable_note(article_url));
            }
            Err(err) => return Err(err),
        };
        let page_url = Url::parse(&metadata.final_url)
            .or_else(|_| Url::parse(article_url))
            .map_err(|err| PipelineError::UnexpectedResponse {
                url: article_url.to_string(),
                message: err.to_string(),
            })?;

        ctx.stage(Stage::Sanitizing);
        let document = sanitize_document(&html);
        let base = document_base(&document, &page_url);

        ctx.stage(Stage::Extracting);
        let extractor = ReadabilityExtractor;
        if !extractor.is_probably_readerable(&document) {
            engine_warn!("job {}: {} may not be a readable article", ctx.job_id, article_url);
            ctx.notice(Notice::NotReaderable {
                url: article_url.to_string(),
            });
        }

        let Some(article) = extractor.extract(&document) else {
            return Ok(ctx.not_parsable_note(article_url));
        };

        let title = title_or_default(&article.title);

        ctx.stage(Stage::Converting);
        let settings = ctx.settings;
        let mut assets = ctx.asset_manager(
            settings.download_images,
            settings.download_images_in_article_dir,
            &title,
        );
        let content = html_to_markdown(&article.content_html, Some(&base), &mut assets).await?;

        let reading_time = article.word_count.div_ceil(WORDS_PER_MINUTE).max(1);
        let title_vars = RenderContext::new().with("title", title.as_str());
        let body_vars = RenderContext::new()
            .with("articleTitle", title.as_str())
            .with("articleURL", article_url)
            .with("articleContent", content)
            .with("author", article.byline.unwrap_or_default())
            .with("siteName", article.site_name.unwrap_or_default())
            .with("articleReadingTime", reading_time.to_string());

        Ok(ctx.render_note(
            &settings.parseable_article_note_title,
            title_vars,
            &settings.parsable_article_note,
            body_vars,
        ))
    }
}

/// Base for resolving relative references: the document's own `<base href>`
/// when present, else the page URL without query and fragment.
fn document_base(document: &str, page_url: &Url) -> Url {
    let mut fallback = page_url.clone();
    fallback.set_query(None);
    fallback.set_fragment(None);

    let Ok(selector) = Selector::parse("base[href]") else {
        return fallback;
    };
    Html::parse_document(document)
        .select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or(fallback)
}
