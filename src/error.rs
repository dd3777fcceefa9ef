use std::time::Duration;

/// Everything that can go wrong while pulling one unit of data (a page, a
/// browser session, a worker task) from the source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited by source")]
    RateLimited,

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed body: {0}")]
    Malformed(String),

    #[error("bad selector `{0}`")]
    Selector(String),

    #[error("browser failure: {0}")]
    Browser(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("worker pool: {0}")]
    Pool(String),
}

impl FetchError {
    /// Transient errors are recovered by sleeping and retrying the same
    /// request. Everything else ends the affected fetch unit.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::RateLimited => true,
            // builder/redirect/decode errors will not go away on retry
            FetchError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

pub type SourceResult<T> = Result<T, FetchError>;
