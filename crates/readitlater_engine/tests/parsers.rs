mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use readitlater_engine::{short_hash, Fetcher, Input, Note, Pipeline, Settings};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

use common::{config, RecordingSink, ScriptedFetcher};

async fn create(settings: Settings, fetcher: &Arc<ScriptedFetcher>, input: &str) -> (Note, TempDir) {
    let vault = TempDir::new().unwrap();
    let dyn_fetcher: Arc<dyn Fetcher> = fetcher.clone();
    let note = Pipeline::new(config(settings, vault.path()), dyn_fetcher)
        .create_note(1, &Input::classify(input), &RecordingSink::default(), &CancellationToken::new())
        .await
        .expect("note");
    (note, vault)
}

fn with_params(base: &str, params: &[(&str, &str)]) -> String {
    Url::parse_with_params(base, params).unwrap().to_string()
}

#[tokio::test]
async fn youtube_with_api_key_uses_video_metadata() {
    let fetcher = ScriptedFetcher::new();
    fetcher.json(
        &with_params(
            "https://www.googleapis.com/youtube/v3/videos",
            &[("part", "snippet"), ("id", "abc123"), ("key", "KEY")],
        ),
        r#"{"items":[{"snippet":{"title":"Fearless Concurrency","description":"Threads!","publishedAt":"2024-01-02T03:04:05Z","channelId":"UCrust","channelTitle":"Rust Channel"}}]}"#,
    );
    let settings = Settings {
        youtube_api_key: Some("KEY".into()),
        youtube_note: "%videoTitle%|%videoId%|%channelName%|%channelURL%|%videoPublishDate%".into(),
        ..Settings::default()
    };

    let (note, _vault) = create(settings, &fetcher, "https://www.youtube.com/watch?v=abc123").await;

    assert_eq!(note.file_name, "Youtube - Fearless Concurrency.md");
    assert_eq!(
        note.content,
        "Fearless Concurrency|abc123|Rust Channel|https://www.youtube.com/channel/UCrust|2024-01-02T03:04:05Z"
    );
}

#[tokio::test]
async fn youtube_without_key_reads_the_watch_page() {
    let fetcher = ScriptedFetcher::new();
    fetcher.html(
        "https://youtu.be/abc123",
        r#"<html><head><title>Fearless Concurrency - YouTube</title></head><body></body></html>"#,
    );

    let (note, _vault) = create(Settings::default(), &fetcher, "https://youtu.be/abc123").await;

    assert_eq!(note.file_name, "Youtube - Fearless Concurrency.md");
    assert!(note
        .content
        .contains("# [Fearless Concurrency](https://youtu.be/abc123)"));
    assert!(note.content.contains("https://www.youtube.com/embed/abc123"));
}

#[tokio::test]
async fn vimeo_uses_oembed() {
    let fetcher = ScriptedFetcher::new();
    fetcher.json(
        &with_params("https://vimeo.com/api/oembed.json", &[("url", "https://vimeo.com/76979871")]),
        r#"{"title":"The New Vimeo Player","author_name":"Vimeo Staff","author_url":"https://vimeo.com/staff"}"#,
    );

    let (note, _vault) = create(Settings::default(), &fetcher, "https://vimeo.com/76979871").await;

    assert_eq!(note.file_name, "Vimeo - The New Vimeo Player.md");
    assert!(note
        .content
        .contains("# [The New Vimeo Player](https://vimeo.com/76979871)"));
    assert!(note.content.contains("https://player.vimeo.com/video/76979871"));
}

#[tokio::test]
async fn bilibili_reads_page_title() {
    let fetcher = ScriptedFetcher::new();
    let url = "https://www.bilibili.com/video/BV1xx411c7mD";
    fetcher.html(
        url,
        r#"<html><head><meta property="og:title" content="Rust 入门_哔哩哔哩_bilibili"></head><body></body></html>"#,
    );

    let (note, _vault) = create(Settings::default(), &fetcher, url).await;

    assert_eq!(note.file_name, "Bilibili - Rust 入门.md");
    assert!(note.content.contains("bvid=BV1xx411c7mD"));
}

#[tokio::test]
async fn tweets_are_converted_from_oembed_html() {
    let fetcher = ScriptedFetcher::new();
    let tweet = "https://twitter.com/rustlang/status/1";
    fetcher.json(
        &with_params(
            "https://publish.twitter.com/oembed",
            &[("url", tweet), ("omit_script", "true")],
        ),
        r#"{"author_name":"Rust","html":"<blockquote class=\"twitter-tweet\"><p lang=\"en\">Rust 2.0 is <a href=\"https://t.co/x\">here</a></p></blockquote>\n<script async src=\"https://platform.twitter.com/widgets.js\"></script>"}"#,
    );

    let (note, _vault) = create(Settings::default(), &fetcher, tweet).await;

    assert_eq!(note.file_name, "Tweet from Rust (2024-05-06 07-08-09).md");
    assert!(note.content.contains("# [Rust](https://twitter.com/rustlang/status/1)"));
    assert!(note.content.contains("> Rust 2.0 is [here](https://t.co/x)"));
    assert!(!note.content.contains("widgets.js"));
}

#[tokio::test]
async fn mastodon_toot_with_media_and_replies() {
    let fetcher = ScriptedFetcher::new();
    let media = "https://files.mastodon.social/media/crab.jpg";
    fetcher.json(
        "https://mastodon.social/api/v1/statuses/1",
        &format!(
            r#"{{"url":"https://mastodon.social/@ferris/1","content":"<p>Hello <strong>fediverse</strong></p>","account":{{"display_name":"Ferris","acct":"ferris"}},"media_attachments":[{{"url":"{media}","description":"a crab"}}]}}"#
        ),
    );
    fetcher.json(
        "https://mastodon.social/api/v1/statuses/1/context",
        r#"{"descendants":[{"url":"https://mastodon.social/@bob/2","content":"<p>Nice</p>","account":{"display_name":"Bob","acct":"bob"}}]}"#,
    );
    fetcher.respond(media, "image/jpeg", vec![7u8; 3]);
    let settings = Settings {
        save_mastodon_replies: true,
        ..Settings::default()
    };

    let (note, vault) = create(settings, &fetcher, "https://mastodon.social/@ferris/1").await;

    let media_path = format!("ReadItLater Inbox/assets/{}.jpg", short_hash(media, 16));
    assert_eq!(note.file_name, "Toot from Ferris (2024-05-06 07-08-09).md");
    assert_eq!(
        note.content,
        format!(
            "[[ReadItLater]] [[Toot]]\n\n# [Ferris](https://mastodon.social/@ferris/1)\n\n\
             > Hello **fediverse**\n\n![a crab](<{media_path}>)\n\n***\n\n\
             [Bob](https://mastodon.social/@bob/2)\n\n> Nice"
        )
    );
    assert!(vault.path().join(&media_path).is_file());
}

#[tokio::test]
async fn stack_exchange_question_with_accepted_answer() {
    let fetcher = ScriptedFetcher::new();
    let url = "https://stackoverflow.com/questions/1/how-do-i-borrow";
    fetcher.html(
        url,
        r#"<html><body>
        <div id="question-header"><h1>How do I borrow?</h1></div>
        <div class="question"><div class="s-prose js-post-body"><p>Question <code>&amp;x</code></p></div>
          <div class="post-signature owner"><div class="user-details"><a href="/users/1/asker">Asker</a></div></div></div>
        <div class="answer"><div class="s-prose js-post-body"><p>Plain answer</p></div>
          <div class="post-signature"><div class="user-details"><a href="/users/2/alice">Alice</a></div></div></div>
        <div class="answer accepted-answer"><div class="s-prose js-post-body"><p>Accepted answer</p></div>
          <div class="post-signature"><div class="user-details"><a href="/users/3/bob">Bob</a></div></div></div>
        </body></html>"#,
    );
    let settings = Settings {
        stack_exchange_note: "%questionTitle%\n%authorName% %authorProfileURL%\n%questionContent%\nTOP:%topAnswer%\nREST:%answers%".into(),
        ..Settings::default()
    };

    let (note, _vault) = create(settings, &fetcher, url).await;

    assert_eq!(note.file_name, "How do I borrow?.md");
    assert_eq!(
        note.content,
        "How do I borrow?\nAsker https://stackoverflow.com/users/1/asker\nQuestion `&x`\n\
         TOP:Answered by: [Bob](https://stackoverflow.com/users/3/bob)\n\nAccepted answer\n\
         REST:Answered by: [Alice](https://stackoverflow.com/users/2/alice)\n\nPlain answer"
    );
}

#[tokio::test]
async fn unrecognised_question_page_keeps_the_link() {
    let fetcher = ScriptedFetcher::new();
    let url = "https://stackoverflow.com/questions/1/q";
    fetcher.html(url, "<html><body><p>redesigned page</p></body></html>");

    let (note, _vault) = create(Settings::default(), &fetcher, url).await;

    assert_eq!(note.file_name, "Article (2024-05-06 07-08-09).md");
    assert!(note.content.contains(&format!("[{url}]({url})")));
}

#[tokio::test]
async fn youtube_falls_back_to_the_page_when_the_api_has_no_video() {
    let fetcher = ScriptedFetcher::new();
    fetcher.json(
        &with_params(
            "https://www.googleapis.com/youtube/v3/videos",
            &[("part", "snippet"), ("id", "gone42"), ("key", "KEY")],
        ),
        r#"{"items":[]}"#,
    );
    fetcher.html(
        "https://youtu.be/gone42",
        r#"<html><head><meta property="og:title" content="Still Here"></head><body></body></html>"#,
    );
    let settings = Settings {
        youtube_api_key: Some("KEY".into()),
        ..Settings::default()
    };

    let (note, _vault) = create(settings, &fetcher, "https://youtu.be/gone42").await;

    assert_eq!(note.file_name, "Youtube - Still Here.md");
}

#[tokio::test]
async fn vimeo_without_title_is_named_no_title() {
    let fetcher = ScriptedFetcher::new();
    fetcher.json(
        &with_params("https://vimeo.com/api/oembed.json", &[("url", "https://vimeo.com/1")]),
        r#"{"title":""}"#,
    );

    let (note, _vault) = create(Settings::default(), &fetcher, "https://vimeo.com/1").await;

    assert_eq!(note.file_name, "Vimeo - No title.md");
}

#[tokio::test]
async fn mastodon_skips_media_still_processing() {
    let fetcher = ScriptedFetcher::new();
    fetcher.json(
        "https://mastodon.social/api/v1/statuses/7",
        r#"{"content":"<p>Soon</p>","account":{"display_name":"Ferris","acct":"ferris"},"media_attachments":[{"url":null,"description":"pending"}]}"#,
    );
    let settings = Settings {
        mastodon_note: "%tootContent%".into(),
        ..Settings::default()
    };

    let (note, _vault) = create(settings, &fetcher, "https://mastodon.social/@ferris/7").await;

    assert_eq!(note.content, "Soon");
}
