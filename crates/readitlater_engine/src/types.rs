use std::fmt;


pub type JobId = u64;

/// Captured input, tagged once by the host or by [`Input::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Url(String),
    PlainText(String),
}

impl Input {
    /// Tag raw clipboard-style input: an absolute http(s) URL becomes `Url`,
    /// anything else is a text snippet.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        match url::Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Input::Url(trimmed.to_string())
            }
            _ => Input::PlainText(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Input::Url(value) | Input::PlainText(value) => value,
        }
    }

    /// The parsed URL, if this is a syntactically valid absolute URL.
    pub fn url(&self) -> Option<url::Url> {
        match self {
            Input::Url(value) => url::Url::parse(value.trim()).ok(),
            Input::PlainText(_) => None,
        }
    }
}

/// The terminal artifact handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub file_name: String,
    pub content: String,
}

impl Note {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dispatching,
    Fetching,
    Sanitizing,
    Extracting,
    Converting,
    DownloadingAssets,
    Rendering,
    Done,
}

/// Non-fatal, user-visible conditions raised while building a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The readability heuristic doubts the page is a single article.
    NotReaderable { url: String },
    /// No article content could be extracted; a fallback note was produced.
    NotParsable { url: String },
    /// An asset could not be stored; the note keeps the remote reference.
    AssetDownloadFailed { url: String, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NotReaderable { url } => {
                write!(f, "{url} is unlikely to be a readable article")
            }
            Notice::NotParsable { url } => {
                write!(f, "could not extract an article from {url}; saved the link only")
            }
            Notice::AssetDownloadFailed { url, reason } => {
                write!(f, "kept remote reference for {url}: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress {
        job_id: JobId,
        stage: Stage,
    },
    Notice {
        job_id: JobId,
        notice: Notice,
    },
    JobCompleted {
        job_id: JobId,
        result: Result<Note, PipelineError>,
    },
}

/// What a fetch is for; decides the content-type allow-list and byte cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Json,
    Asset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: bytes::Bytes,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failures that abort note creation. Extraction-quality problems never
/// show up here; they degrade the note and raise a [`Notice`] instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("unexpected response from {url}: {message}")]
    UnexpectedResponse { url: String, message: String },
    #[error("no parser accepts input {input:?}")]
    NoMatchingParser { input: String },
    #[error("cancelled")]
    Cancelled,
}
