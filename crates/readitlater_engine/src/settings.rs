use serde::{Deserialize, Serialize};

/// Immutable configuration snapshot consumed by every parser.
///
/// Directory paths are relative to the vault root the host stores notes in.
/// Date formats use chrono `strftime` syntax; title formats must avoid
/// characters that are illegal in file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inbox_dir: String,
    pub assets_dir: String,

    pub date_title_fmt: String,
    pub date_content_fmt: String,

    pub youtube_note_title: String,
    pub youtube_note: String,
    pub youtube_api_key: Option<String>,

    pub vimeo_note_title: String,
    pub vimeo_note: String,

    pub bilibili_note_title: String,
    pub bilibili_note: String,

    pub twitter_note_title: String,
    pub twitter_note: String,

    pub parseable_article_note_title: String,
    pub parsable_article_note: String,
    pub not_parseable_article_note_title: String,
    pub not_parsable_article_note: String,
    pub download_images: bool,
    pub download_images_in_article_dir: bool,

    pub text_snippet_note_title: String,
    pub text_snippet_note: String,

    pub mastodon_note_title: String,
    pub mastodon_note: String,
    pub mastodon_reply: String,
    pub download_mastodon_media_attachments: bool,
    pub download_mastodon_media_attachments_in_dir: bool,
    pub save_mastodon_replies: bool,

    pub stack_exchange_note_title: String,
    pub stack_exchange_note: String,
    pub stack_exchange_answer: String,
    pub download_stack_exchange_assets: bool,
    pub download_stack_exchange_assets_in_dir: bool,

    /// Upper bound on simultaneous asset downloads for one note.
    pub asset_download_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inbox_dir: "ReadItLater Inbox".into(),
            assets_dir: "ReadItLater Inbox/assets".into(),
            date_title_fmt: "%Y-%m-%d %H-%M-%S".into(),
            date_content_fmt: "%Y-%m-%d".into(),
            youtube_note_title: "Youtube - %title%".into(),
            youtube_note: "[[ReadItLater]] [[Youtube]]\n\n# [%videoTitle%](%videoURL%)\n\n%videoPlayer%"
                .into(),
            youtube_api_key: None,
            vimeo_note_title: "Vimeo - %title%".into(),
            vimeo_note: "[[ReadItLater]] [[Vimeo]]\n\n# [%videoTitle%](%videoURL%)\n\n%videoPlayer%"
                .into(),
            bilibili_note_title: "Bilibili - %title%".into(),
            bilibili_note:
                "[[ReadItLater]] [[Bilibili]]\n\n# [%videoTitle%](%videoURL%)\n\n%videoPlayer%".into(),
            twitter_note_title: "Tweet from %tweetAuthorName% (%date%)".into(),
            twitter_note:
                "[[ReadItLater]] [[Tweet]]\n\n# [%tweetAuthorName%](%tweetURL%)\n\n%tweetContent%"
                    .into(),
            parseable_article_note_title: "%title%".into(),
            parsable_article_note:
                "[[ReadItLater]] [[Article]]\n\n# [%articleTitle%](%articleURL%)\n\n%articleContent%"
                    .into(),
            not_parseable_article_note_title: "Article (%date%)".into(),
            not_parsable_article_note: "[[ReadItLater]] [[Article]]\n\n[%articleURL%](%articleURL%)"
                .into(),
            download_images: true,
            download_images_in_article_dir: false,
            text_snippet_note_title: "Note %date%".into(),
            text_snippet_note: "[[ReadItLater]] [[Textsnippet]]\n\n%content%".into(),
            mastodon_note_title: "Toot from %tootAuthorName% (%date%)".into(),
            mastodon_note:
                "[[ReadItLater]] [[Toot]]\n\n# [%tootAuthorName%](%tootURL%)\n\n> %tootContent%"
                    .into(),
            mastodon_reply: "[%tootAuthorName%](%tootURL%)\n\n> %tootContent%".into(),
            download_mastodon_media_attachments: true,
            download_mastodon_media_attachments_in_dir: false,
            save_mastodon_replies: false,
            stack_exchange_note_title: "%title%".into(),
            stack_exchange_note: "[[ReadItLater]] [[StackExchange]]\n\n# [%questionTitle%](%questionURL%)\n\nAuthor: [%authorName%](%authorProfileURL%)\n\n%questionContent%\n\n***\n\n%topAnswer%\n\n%answers%".into(),
            stack_exchange_answer:
                "Answered by: [%authorName%](%authorProfileURL%)\n\n%answerContent%".into(),
            download_stack_exchange_assets: true,
            download_stack_exchange_assets_in_dir: false,
            asset_download_concurrency: 4,
        }
    }
}

impl Settings {
    /// The API key, if one is configured and not blank.
    pub fn youtube_api_key(&self) -> Option<&str> {
        self.youtube_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
