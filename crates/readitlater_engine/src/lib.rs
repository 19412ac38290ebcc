//! ReadItLater engine: turns a captured URL or text snippet into a note.
mod assets;
mod config;
mod convert;
mod decode;
mod engine;
mod extract;
mod fetch;
mod filename;
mod parsers;
mod persist;
mod pipeline;
mod progress;
mod sanitize;
mod settings;
mod template;
mod types;

pub use assets::AssetManager;
pub use config::{Clock, EngineConfig};
pub use convert::{collect_media, html_to_markdown, MarkdownRenderer};
pub use decode::{decode_text, DecodedText};
pub use engine::EngineHandle;
pub use extract::{ExtractedArticle, Extractor, ReadabilityExtractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{sanitize_file_name, short_hash};
pub use parsers::{
    BilibiliParser, MastodonParser, ParseContext, Parser, ParserRegistry, StackExchangeParser,
    TextSnippetParser, TwitterParser, VimeoParser, WebsiteParser, YoutubeParser,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::Pipeline;
pub use progress::{ChannelProgressSink, NullProgressSink, ProgressSink};
pub use sanitize::{sanitize_document, sanitize_fragment};
pub use settings::Settings;
pub use template::{format_date, render, RenderContext};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, Input, JobId, Note, Notice,
    PipelineError, ResourceKind, Stage,
};
