//! Content-type specific extractors and the ordered registry that picks one.
use std::path::Path;

use chrono::{DateTime, Local};
use readitlater_logging::{engine_debug, engine_error, engine_info};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::assets::AssetManager;
use crate::decode::decode_text;
use crate::filename::sanitize_file_name;
use crate::progress::ProgressSink;
use crate::settings::Settings;
use crate::template::{format_date, render, RenderContext};
use crate::{
    FailureKind, FetchMetadata, FetchOutput, Fetcher, Input, JobId, Note, Notice, PipelineError,
    ResourceKind, Stage,
};

mod bilibili;
mod mastodon;
mod stackexchange;
mod text_snippet;
mod twitter;
mod vimeo;
mod website;
mod youtube;

pub use bilibili::BilibiliParser;
pub use mastodon::MastodonParser;
pub use stackexchange::StackExchangeParser;
pub use text_snippet::TextSnippetParser;
pub use twitter::TwitterParser;
pub use vimeo::VimeoParser;
pub use website::WebsiteParser;
pub use youtube::YoutubeParser;

/// One supported content type: a pure predicate plus the extraction itself.
#[async_trait::async_trait]
pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must not perform I/O.
    fn test(&self, input: &Input) -> bool;

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError>;
}

/// Parsers in priority order; the first whose predicate accepts wins.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new(parsers: Vec<Box<dyn Parser>>) -> Self {
        Self { parsers }
    }

    pub fn select(&self, input: &Input) -> Result<&dyn Parser, PipelineError> {
        self.parsers
            .iter()
            .find(|parser| parser.test(input))
            .map(|parser| parser.as_ref())
            .ok_or_else(|| PipelineError::NoMatchingParser {
                input: input.as_str().to_string(),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|parser| parser.name()).collect()
    }
}

impl Default for ParserRegistry {
    /// Platform parsers first, then the generic website parser, then the
    /// text snippet fallback.
    fn default() -> Self {
        Self::new(vec![
            Box::new(YoutubeParser),
            Box::new(VimeoParser),
            Box::new(BilibiliParser),
            Box::new(TwitterParser),
            Box::new(StackExchangeParser),
            Box::new(MastodonParser),
            Box::new(WebsiteParser),
            Box::new(TextSnippetParser),
        ])
    }
}

/// Per-note collaborators handed to a parser.
pub struct ParseContext<'a> {
    pub job_id: JobId,
    pub settings: &'a Settings,
    pub fetcher: &'a dyn Fetcher,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
    pub vault_root: &'a Path,
    pub now: DateTime<Local>,
}

impl ParseContext<'_> {
    pub fn stage(&self, stage: Stage) {
        engine_debug!("job {}: {:?}", self.job_id, stage);
        self.sink.stage(self.job_id, stage);
    }

    pub fn notice(&self, notice: Notice) {
        self.sink.notice(self.job_id, notice);
    }

    /// Fetch `url`, giving up as soon as the job is cancelled.
    pub async fn fetch(&self, url: &str, kind: ResourceKind) -> Result<FetchOutput, PipelineError> {
        self.stage(Stage::Fetching);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.fetcher.fetch(url, kind) => result.map_err(|err| {
                if err.kind == FailureKind::Cancelled {
                    return PipelineError::Cancelled;
                }
                engine_error!("job {}: fetching {} failed: {}", self.job_id, url, err);
                PipelineError::Fetch(err)
            }),
        }
    }

    /// Fetch an HTML document and decode it to text.
    pub async fn fetch_document(&self, url: &str) -> Result<(String, FetchMetadata), PipelineError> {
        let output = self.fetch(url, ResourceKind::Document).await?;
        let decoded = decode_text(&output.bytes, output.metadata.content_type.as_deref());
        Ok((decoded.text, output.metadata))
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PipelineError> {
        let output = self.fetch(url, ResourceKind::Json).await?;
        serde_json::from_slice(&output.bytes).map_err(|err| PipelineError::UnexpectedResponse {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    /// `%date%` as used in note titles.
    pub fn date_title(&self) -> String {
        format_date(&self.now, &self.settings.date_title_fmt)
    }

    /// `%date%` as used in note bodies.
    pub fn date_content(&self) -> String {
        format_date(&self.now, &self.settings.date_content_fmt)
    }

    /// An asset manager honoring one content type's download toggles. With
    /// `per_note` set, assets land in a subdirectory named after `note_title`.
    pub fn asset_manager(&self, enabled: bool, per_note: bool, note_title: &str) -> AssetManager<'_> {
        let manager = AssetManager::new(
            self.job_id,
            self.fetcher,
            self.sink,
            self.cancel,
            self.vault_root,
        );
        if !enabled {
            return manager;
        }
        let mut dir = self.settings.assets_dir.clone();
        if per_note {
            dir = format!(
                "{}/{}",
                dir.trim_end_matches(['/', '\\']),
                sanitize_file_name(note_title)
            );
        }
        manager
            .store_in(dir)
            .with_concurrency(self.settings.asset_download_concurrency)
    }

    /// Link-only note for a page that yielded nothing usable. Raises
    /// [`Notice::NotParsable`] so the host can tell the user.
    pub fn not_parsable_note(&self, url: &str) -> Note {
        engine_info!("job {}: nothing to extract from {}, saving the link", self.job_id, url);
        self.notice(Notice::NotParsable {
            url: url.to_string(),
        });
        let settings = self.settings;
        self.render_note(
            &settings.not_parseable_article_note_title,
            RenderContext::new(),
            &settings.not_parsable_article_note,
            RenderContext::new().with("articleURL", url),
        )
    }

    /// Render title and body templates into the final note. `%date%` is
    /// filled in with the title or content format unless already set. A
    /// title that renders blank becomes "No title".
    pub fn render_note(
        &self,
        title_template: &str,
        mut title_vars: RenderContext,
        body_template: &str,
        mut body_vars: RenderContext,
    ) -> Note {
        self.stage(Stage::Rendering);
        if title_vars.get("date").is_none() {
            title_vars.set("date", self.date_title());
        }
        if body_vars.get("date").is_none() {
            body_vars.set("date", self.date_content());
        }
        let file_name = format!("{}.md", title_or_default(&render(title_template, &title_vars)));
        Note::new(file_name, render(body_template, &body_vars))
    }
}

/// Title used when a page yields an empty one.
pub(crate) const DEFAULT_TITLE: &str = "No title";

pub(crate) fn title_or_default(title: &str) -> String {
    match title.trim() {
        "" => DEFAULT_TITLE.to_string(),
        title => title.to_string(),
    }
}

pub(crate) fn host_of(input: &Input) -> Option<String> {
    input
        .url()
        .and_then(|url| url.host_str().map(|host| host.trim_start_matches("www.").to_ascii_lowercase()))
}
