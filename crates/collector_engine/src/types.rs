use std::fmt;

/// One flattened record from the API: the object found under an item wrapper.
pub type ItemRecord = serde_json::Map<String, serde_json::Value>;

/// 1-based page number as sent in `pageNo`.
pub type PageNo = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectEvent {
    Discovered {
        total_count: u64,
        num_of_rows: u64,
        total_pages: PageNo,
    },
    PageFetched {
        page: PageNo,
        total_pages: PageNo,
        items: usize,
    },
    RetryScheduled {
        page: PageNo,
        attempt: u32,
        max_retries: u32,
        error: FetchError,
    },
    PageAbandoned {
        page: PageNo,
        attempts: u32,
        error: FetchError,
    },
}

/// How the page loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Complete,
    /// `page` ran out of attempts; later pages were not requested.
    Exhausted {
        page: PageNo,
        attempts: u32,
        last_error: FetchError,
    },
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::Complete)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub items: Vec<ItemRecord>,
    pub total_count: u64,
    pub total_pages: PageNo,
    pub requests: u32,
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a per-page fetch that failed this way may be attempted again.
    ///
    /// Transport, application and decode failures all qualify. A malformed
    /// endpoint address never recovers.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Network
            | FailureKind::Timeout
            | FailureKind::HttpStatus(_)
            | FailureKind::TooLarge { .. }
            | FailureKind::Api { .. }
            | FailureKind::Decode => true,
            FailureKind::InvalidUrl => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Network,
    Timeout,
    HttpStatus(u16),
    TooLarge { max_bytes: u64, actual: Option<u64> },
    /// The envelope decoded but carried a non-success result code.
    Api { code: String },
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Api { code } => write!(f, "api result code {code}"),
            FailureKind::Decode => write!(f, "malformed response body"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The discovery probe failed; nothing was collected.
    #[error("discovery request failed: {0}")]
    Discovery(FetchError),
    #[error("export failed: {0}")]
    Export(#[from] crate::export::ExportError),
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}
