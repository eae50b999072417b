use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{GatewayError, TransportError};

/// Issues one GET through whatever outbound path the implementation owns.
/// Redirects must not be followed.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(
        &self,
        url: &Url,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// Requests a fresh anonymity circuit. Callers treat failure as non-fatal.
#[async_trait]
pub trait CircuitControl: Send + Sync + 'static {
    async fn rotate_identity(&self) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A URL waiting in the frontier together with its hop distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: Url,
    pub depth: u32,
}

impl CrawlTarget {
    pub fn seed(url: Url) -> Self {
        Self { url, depth: 0 }
    }

    pub fn child(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Page,
    SearchResult,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Page => "page",
            ItemKind::SearchResult => "search_result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "page" => Some(ItemKind::Page),
            "search_result" => Some(ItemKind::SearchResult),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the crawler emits for every page it could fetch and parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub url: String,
    pub content: String,
    pub discovered_at: chrono::DateTime<chrono::Utc>,
    pub link_count: usize,
}

impl PageItem {
    /// Host part of the item URL, `"unknown"` when it does not parse.
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}
