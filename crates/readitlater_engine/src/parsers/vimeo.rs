use serde::Deserialize;
use url::Url;

use crate::parsers::{host_of, title_or_default, ParseContext, Parser};
use crate::template::RenderContext;
use crate::{Input, Note, PipelineError};

const OEMBED_ENDPOINT: &str = "https://vimeo.com/api/oembed.json";

#[derive(Debug, Default, Clone, Copy)]
pub struct VimeoParser;

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    author_url: String,
}

#[async_trait::async_trait]
impl Parser for VimeoParser {
    fn name(&self) -> &'static str {
        "vimeo"
    }

    fn test(&self, input: &Input) -> bool {
        video_id(input).is_some()
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let video_url = input.as_str().trim();
        let id = video_id(input).ok_or_else(|| PipelineError::NoMatchingParser {
            input: video_url.to_string(),
        })?;
        let endpoint = Url::parse_with_params(OEMBED_ENDPOINT, &[("url", video_url)]).map_err(|err| {
            PipelineError::UnexpectedResponse {
                url: OEMBED_ENDPOINT.to_string(),
                message: err.to_string(),
            }
        })?;
        let oembed: OEmbed = ctx.fetch_json(endpoint.as_str()).await?;

        let settings = ctx.settings;
        let title = title_or_default(&oembed.title);
        let title_vars = RenderContext::new().with("title", title.as_str());
        let body_vars = RenderContext::new()
            .with("videoTitle", title.as_str())
            .with("videoURL", video_url)
            .with("videoId", id.as_str())
            .with("videoPlayer", player(&id))
            .with("channelName", oembed.author_name)
            .with("channelURL", oembed.author_url);

        Ok(ctx.render_note(&settings.vimeo_note_title, title_vars, &settings.vimeo_note, body_vars))
    }
}

fn player(id: &str) -> String {
    format!(
        r#"<iframe src="https://player.vimeo.com/video/{id}" width="640" height="360" frameborder="0" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#
    )
}

/// Numeric id from `vimeo.com/<id>` or any `vimeo.com/.../<id>` path.
fn video_id(input: &Input) -> Option<String> {
    if !matches!(host_of(input)?.as_str(), "vimeo.com" | "player.vimeo.com") {
        return None;
    }
    let url = input.url()?;
    let last = url.path_segments()?.filter(|segment| !segment.is_empty()).last()?;
    (last.chars().all(|c| c.is_ascii_digit())).then(|| last.to_string())
}
