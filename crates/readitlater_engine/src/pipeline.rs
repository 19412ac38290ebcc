use std::sync::Arc;

use readitlater_logging::engine_info;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::fetch::Fetcher;
use crate::parsers::{ParseContext, Parser, ParserRegistry};
use crate::progress::ProgressSink;
use crate::{Input, JobId, Note, PipelineError, Stage};

/// Input to note: dispatch to a parser and let it fetch, clean, convert and render.
pub struct Pipeline {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
    registry: ParserRegistry,
}

impl Pipeline {
    pub fn new(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            registry: ParserRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn select_parser(&self, input: &Input) -> Result<&dyn Parser, PipelineError> {
        self.registry.select(input)
    }

    pub async fn create_note(
        &self,
        job_id: JobId,
        input: &Input,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Note, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        sink.stage(job_id, Stage::Dispatching);
        let parser = self.registry.select(input)?;
        engine_info!("job {}: using {} parser", job_id, parser.name());

        let ctx = ParseContext {
            job_id,
            settings: &self.config.settings,
            fetcher: self.fetcher.as_ref(),
            sink,
            cancel,
            vault_root: &self.config.vault_root,
            now: (self.config.now)(),
        };
        let note = parser.extract(input, &ctx).await?;
        sink.stage(job_id, Stage::Done);
        Ok(note)
    }
}
