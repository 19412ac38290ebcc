use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::fetch::FetchSettings;
use crate::settings::Settings;

/// Source of "now" for `%date%` placeholders.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Everything a pipeline needs, built once and shared read-only.
#[derive(Clone)]
pub struct EngineConfig {
    pub settings: Arc<Settings>,
    pub fetch: FetchSettings,
    /// Root the `inbox_dir`/`assets_dir` settings are relative to.
    pub vault_root: PathBuf,
    pub now: Clock,
}

impl EngineConfig {
    pub fn new(settings: Settings, vault_root: impl Into<PathBuf>) -> Self {
        Self {
            settings: Arc::new(settings),
            fetch: FetchSettings::default(),
            vault_root: vault_root.into(),
            now: Arc::new(Local::now),
        }
    }

    pub fn with_fetch_settings(mut self, fetch: FetchSettings) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_clock(mut self, now: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.now = Arc::new(now);
        self
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("settings", &self.settings)
            .field("fetch", &self.fetch)
            .field("vault_root", &self.vault_root)
            .finish_non_exhaustive()
    }
}
