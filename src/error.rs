use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("address template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url}: server returned status {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: decode response: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed Link header: {0:?}")]
    LinkHeader(String),

    #[error("suspicious pagination link outside {origin}: {url}")]
    SuspiciousLink { origin: String, url: String },

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
