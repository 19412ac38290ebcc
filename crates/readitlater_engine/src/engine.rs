use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use readitlater_logging::{engine_debug, engine_error};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::pipeline::Pipeline;
use crate::progress::ChannelProgressSink;
use crate::{EngineEvent, Input, JobId};

enum EngineCommand {
    Enqueue { job_id: JobId, input: Input },
    Cancel { job_id: JobId },
}

type TokenMap = Arc<Mutex<HashMap<JobId, CancellationToken>>>;

/// Runs note creation on a background tokio runtime and reports back through
/// [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let pipeline = Arc::new(Pipeline::new(config, fetcher));

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("failed to start engine runtime: {}", err);
                    return;
                }
            };
            let tokens: TokenMap = Arc::default();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Enqueue { job_id, input } => {
                        let token = CancellationToken::new();
                        if let Ok(mut map) = tokens.lock() {
                            map.insert(job_id, token.clone());
                        }
                        let pipeline = pipeline.clone();
                        let event_tx = event_tx.clone();
                        let tokens = tokens.clone();
                        runtime.spawn(async move {
                            let sink = ChannelProgressSink::new(event_tx.clone());
                            let result = pipeline.create_note(job_id, &input, &sink, &token).await;
                            if let Ok(mut map) = tokens.lock() {
                                map.remove(&job_id);
                            }
                            let _ = event_tx.send(EngineEvent::JobCompleted { job_id, result });
                        });
                    }
                    EngineCommand::Cancel { job_id } => {
                        let token = tokens.lock().ok().and_then(|mut map| map.remove(&job_id));
                        match token {
                            Some(token) => token.cancel(),
                            None => engine_debug!("cancel for unknown job {}", job_id),
                        }
                    }
                }
            }
        });

        Self { cmd_tx, event_rx }
    }

    pub fn enqueue(&self, job_id: JobId, input: Input) {
        let _ = self.cmd_tx.send(EngineCommand::Enqueue { job_id, input });
    }

    /// Abort a running job; it completes with `PipelineError::Cancelled`.
    pub fn cancel(&self, job_id: JobId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { job_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block until the next event; `None` once the engine thread is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
