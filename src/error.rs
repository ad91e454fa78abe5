use thiserror::Error;

/// Failures raised while scraping, parsing and resolving one domain.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("{0}")]
    Parse(String),

    #[error("could not resolve {kind} {query:?}: best match {best:?} scored {score} (< {min_score})")]
    Resolution {
        kind: &'static str,
        query: String,
        best: String,
        score: u8,
        min_score: u8,
    },

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
