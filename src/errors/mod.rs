use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnvVar { key: String, value: String },

    // Network errors
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // User input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ScraperResult<T> = Result<T, ScraperError>;

/// Whether retrying the same request can be expected to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure of a single fetch unit (one feed, one category, one page).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    Status(u16),

    /// Upstream refused automated traffic (403/429).
    #[error("request rejected with HTTP status {0}")]
    Rejected(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout(_) | FetchError::Connection(_) | FetchError::Rejected(_) => {
                ErrorKind::Transient
            }
            FetchError::Status(code) if *code == 429 || *code >= 500 => ErrorKind::Transient,
            FetchError::Status(_) | FetchError::Malformed(_) | FetchError::InvalidUrl(_) => {
                ErrorKind::Permanent
            }
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, FetchError::Rejected(_))
    }

    /// Map a reqwest transport error onto the fetch taxonomy.
    ///
    /// A body that stops arriving (reset, early EOF) is a connection failure.
    /// Only a body that arrived but cannot be decoded is `Malformed`.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            if undecodable_body(err) {
                FetchError::Malformed(err.to_string())
            } else {
                FetchError::Connection(err.to_string())
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else {
            FetchError::Connection(err.to_string())
        }
    }
}

/// True when the error chain holds an IO error of kind `InvalidData`, which
/// is how content decoders (gzip) report a corrupt payload.
fn undecodable_body(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return io.kind() == std::io::ErrorKind::InvalidData;
        }
        source = cause.source();
    }
    false
}
