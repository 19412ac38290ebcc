#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local, TimeZone};
use readitlater_engine::{
    EngineConfig, EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher,
    Notice, ProgressSink, ResourceKind, Settings, Stage,
};

/// Canned responses keyed by exact URL; anything else is a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, (Bytes, String)>>,
    hanging: Mutex<Vec<String>>,
    rejected: Mutex<HashMap<String, String>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, ResourceKind)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, content_type: &str, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), (body.into(), content_type.to_string()));
    }

    pub fn html(&self, url: &str, body: &str) {
        self.respond(url, "text/html; charset=utf-8", body.to_string());
    }

    pub fn json(&self, url: &str, body: &str) {
        self.respond(url, "application/json", body.to_string());
    }

    /// Requests for `url` never complete.
    pub fn hang(&self, url: &str) {
        self.hanging.lock().unwrap().push(url.to_string());
    }

    /// Requests for `url` fail the way a disallowed Content-Type does.
    pub fn reject(&self, url: &str, content_type: &str) {
        self.rejected
            .lock()
            .unwrap()
            .insert(url.to_string(), content_type.to_string());
    }

    /// Every request takes at least `latency` to answer.
    pub fn slow(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Most requests that were ever outstanding at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, ResourceKind)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|(called, _)| called == url).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, kind: ResourceKind) -> Result<FetchOutput, FetchError> {
        self.calls.lock().unwrap().push((url.to_string(), kind));
        let hangs = self.hanging.lock().unwrap().iter().any(|hang| hang == url);
        if hangs {
            std::future::pending::<()>().await;
        }
        let rejected = self.rejected.lock().unwrap().get(url).cloned();
        if let Some(content_type) = rejected {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType { content_type },
                "unsupported content type",
            ));
        }
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some((bytes, content_type)) => Ok(FetchOutput {
                metadata: FetchMetadata {
                    original_url: url.to_string(),
                    final_url: url.to_string(),
                    redirect_count: 0,
                    content_type: Some(content_type),
                    byte_len: bytes.len() as u64,
                },
                bytes,
            }),
            None => Err(FetchError::new(FailureKind::HttpStatus(404), "404 Not Found")),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Notice { notice, .. } => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Progress { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn fixed_now() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
        .single()
        .expect("unambiguous local time")
}

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(readitlater_logging::initialize_for_tests);
}

pub fn config(settings: Settings, vault: &Path) -> EngineConfig {
    init_logging();
    EngineConfig::new(settings, vault).with_clock(fixed_now)
}

/// A page the readability extractor treats as an article.
pub fn article_page(title: &str, extra_body: &str) -> String {
    let paragraph = "Rust gives you control over memory without a garbage collector, \
        and the borrow checker makes sure references never outlive their data. \
        Cargo builds the code, runs the tests and publishes crates to the registry.";
    format!(
        "<html><head><title>{title}</title><meta name=\"author\" content=\"Ferris\">\
         <meta property=\"og:site_name\" content=\"Crab Times\"></head><body>\
         <nav><a href=\"/\">Home</a></nav><article class=\"post-content\">\
         <p>{paragraph}</p><p>{paragraph}</p>{extra_body}<p>{paragraph}</p></article>\
         <footer>Copyright</footer></body></html>"
    )
}
