use readitlater_logging::engine_warn;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::extract::meta_by_key;
use crate::parsers::{host_of, title_or_default, ParseContext, Parser};
use crate::template::RenderContext;
use crate::{Input, Note, PipelineError};

const API_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

#[derive(Debug, Default, Clone, Copy)]
pub struct YoutubeParser;

#[derive(Debug, Default)]
struct VideoInfo {
    title: String,
    channel_id: String,
    channel_name: String,
    channel_url: String,
    description: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_title: String,
}

#[async_trait::async_trait]
impl Parser for YoutubeParser {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn test(&self, input: &Input) -> bool {
        video_id(input).is_some()
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let video_url = input.as_str().trim();
        let id = video_id(input).ok_or_else(|| PipelineError::NoMatchingParser {
            input: video_url.to_string(),
        })?;

        let from_key = match ctx.settings.youtube_api_key() {
            Some(key) => from_api(ctx, &id, key).await?,
            None => None,
        };
        let info = match from_key {
            Some(info) => info,
            None => {
                let (html, _) = ctx.fetch_document(video_url).await?;
                from_page(&html)
            }
        };

        let settings = ctx.settings;
        let title = title_or_default(&info.title);
        let title_vars = RenderContext::new().with("title", title.as_str());
        let mut body_vars = RenderContext::new()
            .with("videoTitle", title.as_str())
            .with("videoURL", video_url)
            .with("videoId", id.as_str())
            .with("videoPlayer", player(&id))
            .with("channelId", info.channel_id)
            .with("channelName", info.channel_name)
            .with("channelURL", info.channel_url);
        if let Some(description) = info.description {
            body_vars.set("videoDescription", description);
        }
        if let Some(published_at) = info.published_at {
            body_vars.set("videoPublishDate", published_at);
        }

        Ok(ctx.render_note(
            &settings.youtube_note_title,
            title_vars,
            &settings.youtube_note,
            body_vars,
        ))
    }
}

/// Video metadata from the Data API, or `None` when it does not know the id.
async fn from_api(
    ctx: &ParseContext<'_>,
    id: &str,
    key: &str,
) -> Result<Option<VideoInfo>, PipelineError> {
    let endpoint = Url::parse_with_params(API_ENDPOINT, &[("part", "snippet"), ("id", id), ("key", key)])
        .map_err(|err| PipelineError::UnexpectedResponse {
            url: API_ENDPOINT.to_string(),
            message: err.to_string(),
        })?;
    let response: VideoListResponse = ctx.fetch_json(endpoint.as_str()).await?;
    let Some(snippet) = response.items.into_iter().next().map(|item| item.snippet) else {
        engine_warn!("job {}: no API data for video {}, reading the watch page", ctx.job_id, id);
        return Ok(None);
    };

    Ok(Some(VideoInfo {
        channel_url: channel_url(&snippet.channel_id),
        title: snippet.title,
        channel_id: snippet.channel_id,
        channel_name: snippet.channel_title,
        description: Some(snippet.description),
        published_at: Some(snippet.published_at),
    }))
}

fn from_page(html: &str) -> VideoInfo {
    let document = Html::parse_document(html);
    let title = meta_by_key(&document, "og:title")
        .or_else(|| {
            let selector = Selector::parse("title").ok()?;
            let text: String = document.select(&selector).next()?.text().collect();
            Some(text.trim().trim_end_matches("- YouTube").trim().to_string())
        })
        .unwrap_or_default();
    let channel_id = meta_by_key(&document, "channelId").unwrap_or_default();
    let channel_name = Selector::parse(r#"[itemprop="author"] [itemprop="name"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .find_map(|element| element.value().attr("content").map(str::to_string))
        })
        .unwrap_or_default();

    VideoInfo {
        channel_url: channel_url(&channel_id),
        title,
        channel_id,
        channel_name,
        description: None,
        published_at: None,
    }
}

fn channel_url(channel_id: &str) -> String {
    if channel_id.is_empty() {
        String::new()
    } else {
        format!("https://www.youtube.com/channel/{channel_id}")
    }
}

fn player(id: &str) -> String {
    format!(
        r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/{id}" title="YouTube video player" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe>"#
    )
}

fn video_id(input: &Input) -> Option<String> {
    let url = input.url()?;
    let host = host_of(input)?;
    let candidate = match host.as_str() {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next()? {
                "watch" => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                "shorts" | "embed" | "live" | "v" => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;
    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(candidate)
}
