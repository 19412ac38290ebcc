use serde::Deserialize;
use url::Url;

use crate::assets::AssetManager;
use crate::convert::{html_to_markdown, link_target};
use crate::parsers::{ParseContext, Parser};
use crate::sanitize::sanitize_fragment;
use crate::template::{render, RenderContext};
use crate::{Input, Note, PipelineError};

const REPLY_SEPARATOR: &str = "\n\n***\n\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct MastodonParser;

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: String,
    account: Account,
    #[serde(default)]
    media_attachments: Vec<MediaAttachment>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    acct: String,
}

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    /// `null` while the instance is still processing the upload.
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    remote_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl MediaAttachment {
    fn source(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.remote_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StatusContext {
    #[serde(default)]
    descendants: Vec<Status>,
}

impl Status {
    fn author(&self) -> &str {
        match self.account.display_name.trim() {
            "" => &self.account.acct,
            name => name,
        }
    }
}

#[async_trait::async_trait]
impl Parser for MastodonParser {
    fn name(&self) -> &'static str {
        "mastodon"
    }

    fn test(&self, input: &Input) -> bool {
        status_ref(input).is_some()
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let toot_url = input.as_str().trim();
        let (origin, id) = status_ref(input).ok_or_else(|| PipelineError::NoMatchingParser {
            input: toot_url.to_string(),
        })?;
        let api = format!("{origin}/api/v1/statuses/{id}");
        let status: Status = ctx.fetch_json(&api).await?;
        let settings = ctx.settings;

        let title_vars = RenderContext::new().with("tootAuthorName", status.author());
        let note_title = render(
            &settings.mastodon_note_title,
            &title_vars.clone().with("date", ctx.date_title()),
        );
        let mut assets = ctx.asset_manager(
            settings.download_mastodon_media_attachments,
            settings.download_mastodon_media_attachments_in_dir,
            &note_title,
        );
        let base = input.url();

        let content = toot_markdown(&status, base.as_ref(), &mut assets).await?;
        let body_vars = RenderContext::new()
            .with("tootAuthorName", status.author())
            .with("tootURL", toot_url)
            .with("tootContent", content);

        let mut replies = Vec::new();
        if settings.save_mastodon_replies {
            let thread: StatusContext = ctx.fetch_json(&format!("{api}/context")).await?;
            for reply in &thread.descendants {
                let reply_content = toot_markdown(reply, base.as_ref(), &mut assets).await?;
                let vars = RenderContext::new()
                    .with("tootAuthorName", reply.author())
                    .with("tootURL", reply.url.as_deref().unwrap_or_default())
                    .with("tootContent", reply_content)
                    .with("date", ctx.date_content());
                replies.push(render(&settings.mastodon_reply, &vars));
            }
        }

        let mut note = ctx.render_note(
            &settings.mastodon_note_title,
            title_vars,
            &settings.mastodon_note,
            body_vars,
        );
        if !replies.is_empty() {
            note.content.push_str(REPLY_SEPARATOR);
            note.content.push_str(&replies.join(REPLY_SEPARATOR));
        }
        Ok(note)
    }
}

/// Status text as markdown followed by its media attachments.
async fn toot_markdown(
    status: &Status,
    base: Option<&Url>,
    assets: &mut AssetManager<'_>,
) -> Result<String, PipelineError> {
    let mut parts = vec![html_to_markdown(&sanitize_fragment(&status.content), base, assets).await?];
    for attachment in &status.media_attachments {
        let Some(source) = attachment.source() else {
            continue;
        };
        let target = assets.resolve(source).await?;
        let alt = attachment
            .description
            .as_deref()
            .unwrap_or_default()
            .replace(['[', ']'], "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        parts.push(format!("![{alt}]({})", link_target(&target)));
    }
    parts.retain(|part| !part.is_empty());
    Ok(parts.join("\n\n"))
}

/// Instance origin and status id from `https://<host>/@<account>/<id>`.
fn status_ref(input: &Input) -> Option<(String, String)> {
    let url = input.url()?;
    if url.scheme() != "https" {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [account, id]
            if account.len() > 1
                && account.starts_with('@')
                && id.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some((url.origin().ascii_serialization(), id.to_string()))
        }
        _ => None,
    }
}
