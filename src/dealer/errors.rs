//! Error types for the dealer website client.

#[derive(Debug, thiserror::Error)]
pub enum DealerError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid listing URL: {0}")]
    InvalidUrl(String),
}
