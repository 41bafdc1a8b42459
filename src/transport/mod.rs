pub mod browser;
pub mod http;
pub mod retry;
pub mod session;

use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;

pub use browser::BrowserSession;
pub use http::HttpTransport;
pub use retry::RetryPolicy;
pub use session::{DEFAULT_PAGE_CACHE_CAPACITY, Session};

/// How pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStrategy {
    /// Plain HTTP requests only.
    Lightweight,
    /// Every page goes through a headless browser.
    FullSession,
    /// HTTP first, browser only when the page lacks embedded state.
    Auto,
}

impl FromStr for TransportStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lightweight" | "http" => Ok(Self::Lightweight),
            "full_session" | "browser" => Ok(Self::FullSession),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown transport strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub bearer: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn with_bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Fetches raw page content. Implemented by the HTTP and browser strategies,
/// and by stubs in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String>;

    fn name(&self) -> &'static str;
}
