use std::sync::mpsc;

use crate::{EngineEvent, JobId, Notice, Stage};

/// Receives progress and notices while a note is being built.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);

    fn stage(&self, job_id: JobId, stage: Stage) {
        self.emit(EngineEvent::Progress { job_id, stage });
    }

    fn notice(&self, job_id: JobId, notice: Notice) {
        self.emit(EngineEvent::Notice { job_id, notice });
    }
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}
