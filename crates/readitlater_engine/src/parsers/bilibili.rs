use scraper::{Html, Selector};

use crate::extract::meta_by_key;
use crate::parsers::{host_of, title_or_default, ParseContext, Parser};
use crate::template::RenderContext;
use crate::{Input, Note, PipelineError};

const TITLE_SUFFIX: &str = "_哔哩哔哩_bilibili";

#[derive(Debug, Default, Clone, Copy)]
pub struct BilibiliParser;

#[async_trait::async_trait]
impl Parser for BilibiliParser {
    fn name(&self) -> &'static str {
        "bilibili"
    }

    fn test(&self, input: &Input) -> bool {
        video_id(input).is_some()
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let video_url = input.as_str().trim();
        let id = video_id(input).ok_or_else(|| PipelineError::NoMatchingParser {
            input: video_url.to_string(),
        })?;
        let (html, _) = ctx.fetch_document(video_url).await?;
        let title = title_or_default(&page_title(&html));

        let settings = ctx.settings;
        let title_vars = RenderContext::new().with("title", title.as_str());
        let body_vars = RenderContext::new()
            .with("videoTitle", title.as_str())
            .with("videoURL", video_url)
            .with("videoId", id.as_str())
            .with("videoPlayer", player(&id));

        Ok(ctx.render_note(
            &settings.bilibili_note_title,
            title_vars,
            &settings.bilibili_note,
            body_vars,
        ))
    }
}

fn page_title(html: &str) -> String {
    let document = Html::parse_document(html);
    meta_by_key(&document, "og:title")
        .or_else(|| {
            let selector = Selector::parse("title").ok()?;
            Some(document.select(&selector).next()?.text().collect::<String>())
        })
        .map(|title| title.trim().trim_end_matches(TITLE_SUFFIX).trim().to_string())
        .unwrap_or_default()
}

fn player(id: &str) -> String {
    let param = match id.strip_prefix("av") {
        Some(aid) => format!("aid={aid}"),
        None => format!("bvid={id}"),
    };
    format!(
        r#"<iframe src="https://player.bilibili.com/player.html?{param}&high_quality=1" scrolling="no" border="0" frameborder="no" framespacing="0" allowfullscreen="true" width="640" height="360"></iframe>"#
    )
}

/// `BV…` or `av…` id from a `bilibili.com/video/<id>` URL.
fn video_id(input: &Input) -> Option<String> {
    if !matches!(host_of(input)?.as_str(), "bilibili.com" | "m.bilibili.com") {
        return None;
    }
    let url = input.url()?;
    let mut segments = url.path_segments()?;
    if segments.next()? != "video" {
        return None;
    }
    let id = segments.next()?;
    let valid = match (id.strip_prefix("BV"), id.strip_prefix("av")) {
        (Some(rest), _) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()),
        (_, Some(rest)) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };
    valid.then(|| id.to_string())
}
