use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ScrapeError, TransportFailureKind};
use crate::transport::{FetchOptions, RetryPolicy, Session, Transport};

/// Single-request strategy: one HTTP GET per page, sharing the session's
/// cookie jar and request pacing.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
    session: Session,
}

impl HttpTransport {
    pub fn new(config: &Config, session: &Session) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder()
            .cookie_provider(session.jar())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScrapeError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScrapeError::Config(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(config),
            session: session.clone(),
        })
    }

    /// Send a GET and return the response once its status is a success,
    /// retrying transient failures. Every attempt waits its pacing turn.
    pub async fn send(&self, url: &str, options: &FetchOptions) -> Result<Response> {
        self.retry
            .run(url, move || async move {
                self.session.pace().await;
                let mut request = self.client.get(url);
                if let Some(timeout) = options.timeout {
                    request = request.timeout(timeout);
                }
                if let Some(token) = &options.bearer {
                    request = request.bearer_auth(token);
                }
                for (name, value) in &options.headers {
                    request = request.header(name.as_str(), value.as_str());
                }

                let response = request.send().await.map_err(|e| map_error(url, e))?;
                check_status(url, response)
            })
            .await
    }

    pub async fn fetch_bytes(&self, url: &str, options: &FetchOptions) -> Result<Vec<u8>> {
        let response = self.send(url, options).await?;
        let bytes = response.bytes().await.map_err(|e| map_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String> {
        debug!("GET {}", url);
        let response = self.send(url, options).await?;
        response.text().await.map_err(|e| map_error(url, e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub(crate) fn map_error(url: &str, e: reqwest::Error) -> ScrapeError {
    let kind = if e.is_timeout() {
        TransportFailureKind::Timeout
    } else if let Some(status) = e.status() {
        status_kind(status)
    } else {
        TransportFailureKind::Refused
    };
    ScrapeError::transport(url, kind, e.to_string())
}

fn status_kind(status: StatusCode) -> TransportFailureKind {
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => TransportFailureKind::Blocked,
        other => TransportFailureKind::HttpStatus(other.as_u16()),
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ScrapeError::transport(
            url,
            status_kind(status),
            format!("server answered {}", status),
        ))
    }
}
