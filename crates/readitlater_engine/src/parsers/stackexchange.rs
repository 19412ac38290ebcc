use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::assets::AssetManager;
use crate::convert::html_to_markdown;
use crate::parsers::{host_of, title_or_default, ParseContext, Parser};
use crate::template::{render, RenderContext};
use crate::{Input, Note, PipelineError};

const ANSWER_SEPARATOR: &str = "\n\n***\n\n";
const SITES: &[&str] = &[
    "stackoverflow.com",
    "superuser.com",
    "serverfault.com",
    "askubuntu.com",
    "mathoverflow.net",
    "stackapps.com",
];

static QUESTION_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#question-header h1").expect("static title selector"));
static QUESTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#question, .question").expect("static question selector"));
static ANSWER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".answer").expect("static answer selector"));
static POST_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-post-body, .s-prose").expect("static body selector"));
static OWNER_SIGNATURE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".post-signature.owner .user-details").expect("static owner selector")
});
static SIGNATURE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".post-signature .user-details").expect("static signature selector")
});
static USER_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static link selector"));

#[derive(Debug, Default, Clone, Copy)]
pub struct StackExchangeParser;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct UserRef {
    name: String,
    profile_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Post {
    html: String,
    author: UserRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QuestionPage {
    title: String,
    question: Post,
    answers: Vec<Post>,
    accepted: Option<usize>,
}

#[async_trait::async_trait]
impl Parser for StackExchangeParser {
    fn name(&self) -> &'static str {
        "stackexchange"
    }

    fn test(&self, input: &Input) -> bool {
        is_question_url(input)
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let question_url = input.as_str().trim();
        let (html, metadata) = ctx.fetch_document(question_url).await?;
        let page_url = Url::parse(&metadata.final_url)
            .or_else(|_| Url::parse(question_url))
            .map_err(|err| PipelineError::UnexpectedResponse {
                url: question_url.to_string(),
                message: err.to_string(),
            })?;
        let Some(page) = scrape(&html, &page_url) else {
            return Ok(ctx.not_parsable_note(question_url));
        };

        let settings = ctx.settings;
        let title_vars = RenderContext::new().with("title", page.title.as_str());
        let note_title = render(
            &settings.stack_exchange_note_title,
            &title_vars.clone().with("date", ctx.date_title()),
        );
        let mut assets = ctx.asset_manager(
            settings.download_stack_exchange_assets,
            settings.download_stack_exchange_assets_in_dir,
            &note_title,
        );

        let question_content = html_to_markdown(&page.question.html, Some(&page_url), &mut assets).await?;

        let mut rendered = Vec::with_capacity(page.answers.len());
        for answer in &page.answers {
            rendered.push(render_answer(ctx, answer, &page_url, &mut assets).await?);
        }
        let top_index = page.accepted.unwrap_or(0);
        let top_answer = if rendered.is_empty() {
            String::new()
        } else {
            rendered.remove(top_index.min(rendered.len() - 1))
        };

        let body_vars = RenderContext::new()
            .with("questionTitle", page.title.as_str())
            .with("questionURL", question_url)
            .with("authorName", page.question.author.name.as_str())
            .with("authorProfileURL", page.question.author.profile_url.as_str())
            .with("questionContent", question_content)
            .with("topAnswer", top_answer)
            .with("answers", rendered.join(ANSWER_SEPARATOR));

        Ok(ctx.render_note(
            &settings.stack_exchange_note_title,
            title_vars,
            &settings.stack_exchange_note,
            body_vars,
        ))
    }
}

async fn render_answer(
    ctx: &ParseContext<'_>,
    answer: &Post,
    base: &Url,
    assets: &mut AssetManager<'_>,
) -> Result<String, PipelineError> {
    let content = html_to_markdown(&answer.html, Some(base), assets).await?;
    let vars = RenderContext::new()
        .with("answerContent", content)
        .with("authorName", answer.author.name.as_str())
        .with("authorProfileURL", answer.author.profile_url.as_str())
        .with("date", ctx.date_content());
    Ok(render(&ctx.settings.stack_exchange_answer, &vars))
}

fn scrape(html: &str, page_url: &Url) -> Option<QuestionPage> {
    let document = Html::parse_document(html);
    let question = document.select(&QUESTION).next()?;
    let heading = document
        .select(&QUESTION_TITLE)
        .next()
        .map(|h1| collapse(&h1.text().collect::<String>()))
        .unwrap_or_default();
    let title = title_or_default(&heading);

    let question = Post {
        html: post_body(question)?,
        author: question
            .select(&OWNER_SIGNATURE)
            .next()
            .or_else(|| question.select(&SIGNATURE).last())
            .map(|details| user_ref(details, page_url))
            .unwrap_or_default(),
    };

    let mut answers = Vec::new();
    let mut accepted = None;
    for answer in document.select(&ANSWER) {
        let Some(html) = post_body(answer) else {
            continue;
        };
        let is_accepted = answer
            .value()
            .classes()
            .any(|class| class.eq_ignore_ascii_case("accepted-answer"));
        if accepted.is_none() && is_accepted {
            accepted = Some(answers.len());
        }
        answers.push(Post {
            html,
            // The author signature follows the editor's.
            author: answer
                .select(&SIGNATURE)
                .last()
                .map(|details| user_ref(details, page_url))
                .unwrap_or_default(),
        });
    }

    Some(QuestionPage {
        title,
        question,
        answers,
        accepted,
    })
}

fn post_body(post: ElementRef) -> Option<String> {
    post.select(&POST_BODY).next().map(|body| body.inner_html())
}

fn user_ref(details: ElementRef, page_url: &Url) -> UserRef {
    match details.select(&USER_LINK).next() {
        Some(link) => UserRef {
            name: collapse(&link.text().collect::<String>()),
            profile_url: link
                .value()
                .attr("href")
                .and_then(|href| page_url.join(href).ok())
                .map(String::from)
                .unwrap_or_default(),
        },
        None => UserRef {
            name: details
                .text()
                .map(str::trim)
                .find(|text| !text.is_empty())
                .unwrap_or_default()
                .to_string(),
            profile_url: String::new(),
        },
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_question_url(input: &Input) -> bool {
    let Some(host) = host_of(input) else {
        return false;
    };
    let known = SITES.contains(&host.as_str()) || host.ends_with(".stackexchange.com");
    let Some(url) = input.url() else {
        return false;
    };
    let mut segments = url.path_segments().into_iter().flatten();
    known
        && segments.next() == Some("questions")
        && segments
            .next()
            .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <div id="question-header"><h1><a href="/questions/1/q">How do I   borrow?</a></h1></div>
        <div id="question" class="question">
          <div class="s-prose js-post-body"><p>Question body</p></div>
          <div class="post-signature"><div class="user-details"><a href="/users/9/editor">Editor</a></div></div>
          <div class="post-signature owner"><div class="user-details"><a href="/users/1/asker">Asker</a></div></div>
        </div>
        <div class="answer"><div class="s-prose js-post-body"><p>First</p></div>
          <div class="post-signature"><div class="user-details"><a href="/users/2/a">Alice</a></div></div></div>
        <div class="answer accepted-answer"><div class="s-prose js-post-body"><p>Accepted</p></div>
          <div class="post-signature"><div class="user-details">community wiki</div></div></div>
        </body></html>"#;

    #[test]
    fn scrapes_question_answers_and_authors() {
        let base = Url::parse("https://stackoverflow.com/questions/1/q").unwrap();
        let page = scrape(PAGE, &base).expect("question page");
        assert_eq!(page.title, "How do I borrow?");
        assert!(page.question.html.contains("Question body"));
        assert_eq!(page.question.author.name, "Asker");
        assert_eq!(page.question.author.profile_url, "https://stackoverflow.com/users/1/asker");
        assert_eq!(page.answers.len(), 2);
        assert_eq!(page.accepted, Some(1));
        assert_eq!(page.answers[0].author.name, "Alice");
        assert_eq!(page.answers[1].author.name, "community wiki");
        assert_eq!(page.answers[1].author.profile_url, "");
    }

    #[test]
    fn question_urls_on_network_sites() {
        let matches = |raw: &str| is_question_url(&Input::classify(raw));
        assert!(matches("https://stackoverflow.com/questions/123/title"));
        assert!(matches("https://unix.stackexchange.com/questions/42"));
        assert!(!matches("https://stackoverflow.com/users/123"));
        assert!(!matches("https://example.com/questions/123"));
    }
}
