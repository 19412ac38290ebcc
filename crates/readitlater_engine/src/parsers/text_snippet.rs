use crate::parsers::{ParseContext, Parser};
use crate::template::RenderContext;
use crate::{Input, Note, PipelineError};

/// Fallback for anything that is not a URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSnippetParser;

#[async_trait::async_trait]
impl Parser for TextSnippetParser {
    fn name(&self) -> &'static str {
        "text_snippet"
    }

    fn test(&self, input: &Input) -> bool {
        matches!(input, Input::PlainText(_))
    }

    async fn extract(&self, input: &Input, ctx: &ParseContext<'_>) -> Result<Note, PipelineError> {
        let settings = ctx.settings;
        let body = RenderContext::new().with("content", input.as_str());
        Ok(ctx.render_note(
            &settings.text_snippet_note_title,
            RenderContext::new(),
            &settings.text_snippet_note,
            body,
        ))
    }
}
