use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered, but not with a 2xx. The data set is not built yet.
    #[error("Graph data not ready (HTTP {status}): {body}")]
    NotReady { status: u16, body: String },

    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed graph data: {0}")]
    Malformed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotReady { .. } => "not_ready",
            FetchError::Transport(_) => "transport",
            FetchError::Malformed(_) => "malformed",
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Other(_) => "other",
        }
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, FetchError::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
