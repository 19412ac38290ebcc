use serde::Deserialize;
use url::Url;

use crate::assets::AssetManager;
use crate::convert::html_to_markdown;
use crate::parsers::{host_of, ParseContext, Parser};
use crate::sanitize::sanitize_fragment;
use crate::template::RenderContext;
use crate::{Input, Note, PipelineError};

const OEMBED_ENDPOINT: &str = "https://publish.twitter.com/oembed";

#[derive(Debug, Default, Clone, Copy)]
pub struct TwitterParser;

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    author_name: String,
    html: String,
}

#[async_trait::async_trait]
impl Parser for TwitterParser {
    fn name(&self) -> &'static str {
        "twitter"
    }

    fn test(&self, input: &Input) -> bool {
        is_status_url(input)
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let tweet_url = input.as_str().trim();
        let endpoint = Url::parse_with_params(
            OEMBED_ENDPOINT,
            &[("url", tweet_url), ("omit_script", "true")],
        )
        .map_err(|err| PipelineError::UnexpectedResponse {
            url: OEMBED_ENDPOINT.to_string(),
            message: err.to_string(),
        })?;
        let oembed: OEmbed = ctx.fetch_json(endpoint.as_str()).await?;

        // Embedded tweets keep their media remote.
        let mut assets = AssetManager::new(ctx.job_id, ctx.fetcher, ctx.sink, ctx.cancel, ctx.vault_root);
        let base = input.url();
        let content = html_to_markdown(&sanitize_fragment(&oembed.html), base.as_ref(), &mut assets).await?;

        let settings = ctx.settings;
        let title_vars = RenderContext::new().with("tweetAuthorName", oembed.author_name.as_str());
        let body_vars = RenderContext::new()
            .with("tweetAuthorName", oembed.author_name.as_str())
            .with("tweetURL", tweet_url)
            .with("tweetContent", content);

        Ok(ctx.render_note(
            &settings.twitter_note_title,
            title_vars,
            &settings.twitter_note,
            body_vars,
        ))
    }
}

/// `twitter.com/<user>/status/<id>` or the same on `x.com`.
fn is_status_url(input: &Input) -> bool {
    let Some(host) = host_of(input) else {
        return false;
    };
    if !matches!(host.as_str(), "twitter.com" | "mobile.twitter.com" | "x.com") {
        return false;
    }
    let Some(url) = input.url() else {
        return false;
    };
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    matches!(
        segments.as_slice(),
        [_, "status", id, ..] if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_urls_on_both_domains() {
        let status = |raw: &str| is_status_url(&Input::classify(raw));
        assert!(status("https://twitter.com/rustlang/status/1234567890"));
        assert!(status("https://x.com/rustlang/status/1234567890/photo/1"));
        assert!(!status("https://x.com/rustlang"));
        assert!(!status("https://twitter.com/rustlang/status/abc"));
    }
}
