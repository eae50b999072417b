use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Why a single request attempt did not produce a usable page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 403/404: the site answered definitively, retrying would only burn circuits.
    #[error("{url} not available (HTTP {status})")]
    NotAvailable { url: String, status: u16 },

    #[error("{url} failed after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: TransportError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("control port authentication failed: {0}")]
    AuthFailed(String),

    #[error("control port unavailable: {0}")]
    Unavailable(String),
}
