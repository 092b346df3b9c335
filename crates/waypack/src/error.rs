use reqwest::StatusCode;

// Custom error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} timed out")]
    Timeout { url: String },

    #[error("server returned status {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("app shell is not installed")]
    ShellUnavailable,

    #[error("{id} is not available offline")]
    NotAvailableOffline { id: String },

    #[error("background worker is not running")]
    WorkerUnavailable,
}

impl EngineError {
    /// Map a transport-level failure for `url`, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            EngineError::Timeout {
                url: url.to_string(),
            }
        } else {
            EngineError::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
